/// Authenticated context for one request. The OAuth exchange happens
/// elsewhere; by the time a pipeline runs, the caller has a bearer token
/// and this carries it into every outbound Spotify call. Never stored
/// beyond the request that supplied it.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}
