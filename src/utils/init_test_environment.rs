use std::path::PathBuf;

/// route `log` output through the test harness, safe to call from every test
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// a fresh image path under the system temp directory, removed if it already exists
pub fn temp_image_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("mini-ext2-{}-{name}.img", std::process::id()));
    if path.exists() {
        std::fs::remove_file(&path).expect("Failed to remove old image file");
    }
    path
}
