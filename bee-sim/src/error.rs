use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("{path}: {source}")]
    Assemble { path: PathBuf, source: bee_asm::Error },

    #[error("could not load the image into a {memory}-byte VM: {source}")]
    Load { memory: u64, source: bee::LoadError },
}
