pub const DEFAULT_STORAGE_HOST: &str = "storage.googleapis.com";
pub const DEFAULT_UPLOAD_HOST: &str = "www.googleapis.com";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/storage/v1/";
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Immutable settings a bucket handle is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketConfig {
    pub project_id: String,
    pub name: String,

    /// Host serving direct object downloads.
    pub storage_host: String,

    /// Host serving `/upload/storage/v1/...`.
    pub upload_host: String,

    /// Base URL that resource templates such as `b/{bucket}/o/{object}` are
    /// resolved against. Always ends with `/`.
    pub api_base: String,

    pub user_agent: String,
}

impl BucketConfig {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            storage_host: DEFAULT_STORAGE_HOST.to_string(),
            upload_host: DEFAULT_UPLOAD_HOST.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_storage_host(mut self, host: impl Into<String>) -> Self {
        self.storage_host = host.into();
        self
    }

    pub fn with_upload_host(mut self, host: impl Into<String>) -> Self {
        self.upload_host = host.into();
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }

        self.api_base = base;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
