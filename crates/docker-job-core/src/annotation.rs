//! Path annotations in the job argument vector.
//!
//! Two forms mark an argument as a host path:
//!
//! - prefix form: `input:<path>` / `output:<path>` tags a single argument
//! - block form: `inputs: a b :inputs` / `outputs: x :outputs` tags every
//!   argument in between
//!
//! Delimiters and prefixes are case-insensitive. Block delimiters are
//! consumed; every other argument keeps its position.

use crate::error::AnnotationError;

/// Direction of a host path relative to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathMode {
    Input,
    Output,
}

impl std::fmt::Display for PathMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathMode::Input => write!(f, "input"),
            PathMode::Output => write!(f, "output"),
        }
    }
}

/// Tag carried by every argument after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgTag {
    Untagged,
    Input,
    Output,
}

impl ArgTag {
    pub fn mode(&self) -> Option<PathMode> {
        match self {
            ArgTag::Untagged => None,
            ArgTag::Input => Some(PathMode::Input),
            ArgTag::Output => Some(PathMode::Output),
        }
    }
}

impl From<PathMode> for ArgTag {
    fn from(mode: PathMode) -> Self {
        match mode {
            PathMode::Input => ArgTag::Input,
            PathMode::Output => ArgTag::Output,
        }
    }
}

/// One job argument with its tag. `text` has any inline prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedArgument {
    /// Position in the annotated sequence (block delimiters excluded)
    pub index: usize,
    pub text: String,
    pub tag: ArgTag,
}

enum Delimiter {
    Open(PathMode),
    Close(PathMode),
}

fn delimiter(token: &str) -> Option<Delimiter> {
    const DELIMITERS: [(&str, Delimiter); 4] = [
        ("inputs:", Delimiter::Open(PathMode::Input)),
        ("outputs:", Delimiter::Open(PathMode::Output)),
        (":inputs", Delimiter::Close(PathMode::Input)),
        (":outputs", Delimiter::Close(PathMode::Output)),
    ];
    DELIMITERS
        .into_iter()
        .find(|(tag, _)| token.eq_ignore_ascii_case(tag))
        .map(|(_, delimiter)| delimiter)
}

/// Split an inline `input:` / `output:` prefix off `token`.
pub fn strip_mode_prefix(token: &str) -> Option<(PathMode, &str)> {
    [("input:", PathMode::Input), ("output:", PathMode::Output)]
        .into_iter()
        .find_map(|(prefix, mode)| {
            let head = token.get(..prefix.len())?;
            head.eq_ignore_ascii_case(prefix)
                .then(|| (mode, &token[prefix.len()..]))
        })
}

/// Tag every argument of the raw job argument vector.
///
/// Fails on an unmatched or mismatched close tag, a block opened inside
/// another block, or a block left open at the end of the arguments.
pub fn parse_annotations<S: AsRef<str>>(
    args: &[S],
) -> Result<Vec<AnnotatedArgument>, AnnotationError> {
    let mut annotated = Vec::with_capacity(args.len());
    let mut block: Option<PathMode> = None;

    for (position, raw) in args.iter().enumerate() {
        let token = raw.as_ref();

        match (delimiter(token), block) {
            (Some(Delimiter::Open(nested)), Some(open)) => {
                return Err(AnnotationError::NestedBlock {
                    open,
                    nested,
                    position,
                });
            }
            (Some(Delimiter::Open(mode)), None) => {
                block = Some(mode);
                continue;
            }
            (Some(Delimiter::Close(_)), None) => {
                return Err(AnnotationError::UnexpectedClose {
                    tag: token.to_string(),
                    position,
                });
            }
            (Some(Delimiter::Close(close)), Some(open)) if close != open => {
                return Err(AnnotationError::MismatchedClose {
                    open,
                    close,
                    position,
                });
            }
            (Some(Delimiter::Close(_)), Some(_)) => {
                block = None;
                continue;
            }
            (None, _) => {}
        }

        let (text, tag) = match (strip_mode_prefix(token), block) {
            (Some((mode, rest)), _) => (rest, ArgTag::from(mode)),
            (None, Some(mode)) => (token, ArgTag::from(mode)),
            (None, None) => (token, ArgTag::Untagged),
        };
        annotated.push(AnnotatedArgument {
            index: annotated.len(),
            text: text.to_string(),
            tag,
        });
    }

    if let Some(mode) = block {
        return Err(AnnotationError::UnterminatedBlock { mode });
    }
    Ok(annotated)
}
