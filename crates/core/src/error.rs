use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to list data root {path}: {source}", path = path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list modality directory {path}: {source}", path = path.display())]
    ModalityDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read PAR file: {0}")]
    ParRead(std::io::Error),
    #[error("PAR header error: {0}")]
    Par(#[from] bidsconv_par::ParError),

    #[error("failed to read sidecar: {0}")]
    SidecarRead(std::io::Error),
    #[error("failed to parse sidecar JSON: {0}")]
    SidecarParse(serde_json::Error),
    #[error("sidecar is not a JSON object: {}", .0.display())]
    SidecarNotObject(PathBuf),
    #[error("failed to serialise sidecar JSON: {0}")]
    SidecarSerialization(serde_json::Error),
    #[error("failed to write sidecar: {0}")]
    SidecarWrite(std::io::Error),
    #[error("failed to back up sidecar: {0}")]
    Backup(std::io::Error),
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;
