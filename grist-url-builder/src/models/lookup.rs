use super::UpstreamError;

/// Result of an upstream lookup that degrades instead of failing.
///
/// `Fallback` carries the default value the caller should use together with
/// the reason the upstream call did not succeed.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    Fallback { value: T, cause: UpstreamError },
}

impl<T> Lookup<T> {
    pub fn value(&self) -> &T {
        match self {
            Lookup::Found(value) | Lookup::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Lookup::Found(value) | Lookup::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Lookup::Fallback { .. })
    }

    pub fn cause(&self) -> Option<&UpstreamError> {
        match self {
            Lookup::Found(_) => None,
            Lookup::Fallback { cause, .. } => Some(cause),
        }
    }
}
