use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("root element `{0}` is not in the tree")]
    MissingRoot(String),
}
