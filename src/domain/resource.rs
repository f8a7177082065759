//! Tri-state result carried by live feeds

/// Current state of a live query
///
/// A feed starts in `Loading` and then reports `Success` or `Error` once per
/// backend change. States may repeat; none of them is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> Resource<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Resource::Error(message.into())
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Resource::Error(message) => Some(message),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Loading => "loading",
            Resource::Success(_) => "success",
            Resource::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let ok: Resource<u32> = Resource::Success(7);
        assert_eq!(ok.message(), None);
        assert_eq!(ok.as_str(), "success");

        let err: Resource<u32> = Resource::error("boom");
        assert_eq!(err.message(), Some("boom"));
        assert_eq!(err.as_str(), "error");

        assert_eq!(Resource::<u32>::Loading.as_str(), "loading");
    }
}
