//! Pre-fetched build datasets.

use kci_protocol::BuildRecord;
use std::fs;
use std::path::Path;

use super::FetchError;

/// Load a flat JSON array of builds.
pub fn load_local(path: &Path) -> Result<Vec<BuildRecord>, FetchError> {
    let contents = fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    BuildRecord::parse_list(&contents).map_err(|source| FetchError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_local() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(
            temp,
            r#"[
                {{"job": "mainline", "git_branch": "master", "kernel": "v5.0",
                  "arch": "arm64", "defconfig": "defconfig", "status": "PASS",
                  "kernel_image": "Image", "dtb_dir_data": ["foo.dtb"]}},
                {{"job": "mainline", "git_branch": "master", "kernel": "v5.0",
                  "arch": "arm64", "defconfig": "allnoconfig", "status": "FAIL"}}
            ]"#
        )
        .unwrap();

        let builds = load_local(temp.path()).unwrap();
        assert_eq!(builds.len(), 2);
        assert!(builds[0].is_pass());
        assert!(!builds[1].is_pass());
    }

    #[test]
    fn test_load_local_missing() {
        let err = load_local(Path::new("/nonexistent/builds.json")).unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn test_load_local_not_an_array() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, r#"{{"result": []}}"#).unwrap();

        let err = load_local(temp.path()).unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }
}
