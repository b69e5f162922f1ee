use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

/// Reads a JSON document, `None` when the file does not exist.
pub async fn read_json<T, P>(path: P) -> Result<Option<T>, std::io::Error>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let content = match tokio::fs::read(path.as_ref()).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    Ok(Some(serde_json::from_slice(&content)?))
}

/// Writes through a sibling temp file so readers never see a partial document.
pub async fn write_json<T, P>(path: P, value: &T) -> Result<(), std::io::Error>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let content = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;

    Ok(())
}

pub async fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<(), std::io::Error> {
    match tokio::fs::remove_file(path.as_ref()).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let value: Option<Vec<i64>> = read_json(dir.path().join("missing.json")).await.unwrap();

        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_write_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("values.json");

        write_json(&path, &vec![1, 2, 3]).await.unwrap();
        let value: Option<Vec<i64>> = read_json(&path).await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        remove_if_exists(&path).await.unwrap();
        remove_if_exists(&path).await.unwrap();
        assert!(!path.exists());
    }
}
