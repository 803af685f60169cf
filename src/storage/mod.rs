pub mod session_db;

pub use session_db::SessionDatabase;

use std::fs;
use std::path::Path;

/// Ensure the directory holding `db_path` exists
pub fn ensure_data_dir(db_path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
