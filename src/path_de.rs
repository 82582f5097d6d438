use serde::de::DeserializeOwned;

use crate::error::PathError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_path_error)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_path_error)
}

fn into_path_error(err: serde_path_to_error::Error<serde_json::Error>) -> PathError {
    let path = err.path().to_string();
    PathError { path, message: err.into_inner().to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Outer { inner: Inner }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Inner { threads: usize }

    #[test]
    fn error_names_the_failing_path() {
        let err = from_str_with_path::<Outer>(r#"{"inner": {"threads": "four"}}"#).unwrap_err();
        assert_eq!(err.path, "inner.threads");
        assert!(err.to_string().starts_with("at JSON path inner.threads"));
    }

    #[test]
    fn slice_and_str_agree() {
        let src = r#"{"inner": {"threads": 2}}"#;
        let a = from_str_with_path::<Outer>(src).unwrap();
        let b = from_slice_with_path::<Outer>(src.as_bytes()).unwrap();
        assert_eq!(a.inner.threads, b.inner.threads);
    }
}
