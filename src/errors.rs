use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error-clinsched-config-1 Required environment variable not set: {var_name}")]
    EnvVarRequired { var_name: String },

    #[error("error-clinsched-config-2 Version not available")]
    VersionNotAvailable,

    #[error("error-clinsched-config-3 Invalid duration value: {value}")]
    InvalidDuration { value: String },

    #[error("error-clinsched-config-4 Invalid credential: {details}")]
    InvalidCredential { details: String },
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("error-clinsched-auth-1 Authentication failed for {username}: {details}")]
    AuthenticationFailed { username: String, details: String },

    #[error("error-clinsched-auth-2 Authentication service unavailable: {details}")]
    ServiceUnavailable { details: String },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("error-clinsched-registry-1 Task definition not found: {name}")]
    DefinitionNotFound { name: String },

    #[error("error-clinsched-registry-2 Registry backend operation failed: {operation}: {details}")]
    BackendFailed { operation: String, details: String },

    #[error("error-clinsched-registry-3 Invalid task definition: {name}: {details}")]
    InvalidDefinition { name: String, details: String },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("error-clinsched-queue-1 Queue fetch failed: {details}")]
    FetchFailed { details: String },

    #[error("error-clinsched-queue-2 Queue entry update failed: entry {entry_id}: {details}")]
    UpdateFailed { entry_id: u64, details: String },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("error-clinsched-index-1 Section listing failed: {details}")]
    SectionListingFailed { details: String },

    #[error("error-clinsched-index-2 Section rebuild failed: {section}: {details}")]
    SectionRebuildFailed { section: String, details: String },
}
