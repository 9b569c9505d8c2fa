// ABOUTME: Error types and non-local control-flow signals for the interpreter

use crate::token::Token;
use crate::value::Value;
use thiserror::Error;

/// A positioned interpreter error. The kind names are stable: `catch`
/// clauses in user code match against them by identifier.
#[derive(Error, Debug, Clone)]
pub enum MryaError {
    #[error("[Line {line}] LexerError: {message}")]
    Lexer { line: usize, message: String },

    #[error("[Line {}] ParseError at '{}': {message}", token.line, token.lexeme)]
    Parse { token: Token, message: String },

    #[error("RuntimeError: {message}")]
    Runtime {
        token: Option<Token>,
        message: String,
    },

    #[error("TypeMismatch: {message}")]
    TypeMismatch { token: Token, message: String },

    #[error("RaisedError: {message}")]
    Raised {
        token: Option<Token>,
        message: String,
    },

    #[error("ClassFunctionError: {message}")]
    ClassFunction { token: Option<Token>, message: String },
}

impl MryaError {
    pub fn runtime(token: &Token, message: impl Into<String>) -> Self {
        MryaError::Runtime {
            token: Some(token.clone()),
            message: message.into(),
        }
    }

    pub fn runtime_bare(message: impl Into<String>) -> Self {
        MryaError::Runtime {
            token: None,
            message: message.into(),
        }
    }

    pub fn parse(token: &Token, message: impl Into<String>) -> Self {
        MryaError::Parse {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn class_function(token: &Token, message: impl Into<String>) -> Self {
        MryaError::ClassFunction {
            token: Some(token.clone()),
            message: message.into(),
        }
    }

    /// The stable identifier matched by `catch` clauses.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MryaError::Lexer { .. } => "LexerError",
            MryaError::Parse { .. } => "ParseError",
            MryaError::Runtime { .. } => "RuntimeError",
            MryaError::TypeMismatch { .. } => "TypeMismatch",
            MryaError::Raised { .. } => "RaisedError",
            MryaError::ClassFunction { .. } => "ClassFunctionError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            MryaError::Lexer { message, .. }
            | MryaError::Parse { message, .. }
            | MryaError::Runtime { message, .. }
            | MryaError::TypeMismatch { message, .. }
            | MryaError::Raised { message, .. }
            | MryaError::ClassFunction { message, .. } => message,
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            MryaError::Lexer { .. } => None,
            MryaError::Parse { token, .. } | MryaError::TypeMismatch { token, .. } => Some(token),
            MryaError::Runtime { token, .. }
            | MryaError::Raised { token, .. }
            | MryaError::ClassFunction { token, .. } => token.as_ref(),
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            MryaError::Lexer { line, .. } => Some(*line),
            _ => self.token().map(|t| t.line),
        }
    }
}

/// Non-local control signals on the evaluator's result channel. Loops
/// intercept `Break`/`Continue`, call frames intercept `Return`, and
/// `try`/`catch` intercepts `Error`; everything else propagates.
#[derive(Debug, Clone)]
pub enum Flow {
    Error(MryaError),
    Return(Value),
    Break,
    Continue,
}

impl From<MryaError> for Flow {
    fn from(err: MryaError) -> Self {
        Flow::Error(err)
    }
}

/// Failure reported by a native function. Natives have no source position;
/// the evaluator attaches the call-site token when converting to `MryaError`.
#[derive(Debug, Clone)]
pub enum NativeError {
    Runtime(String),
    Raised(String),
    /// An already-positioned error passing through a native (e.g. an error
    /// raised by user code a native called back into).
    Wrapped(MryaError),
}

impl NativeError {
    pub fn msg(message: impl Into<String>) -> Self {
        NativeError::Runtime(message.into())
    }

    pub fn raised(message: impl Into<String>) -> Self {
        NativeError::Raised(message.into())
    }

    pub fn into_error(self, token: &Token) -> MryaError {
        match self {
            NativeError::Runtime(message) => MryaError::Runtime {
                token: Some(token.clone()),
                message,
            },
            NativeError::Raised(message) => MryaError::Raised {
                token: Some(token.clone()),
                message,
            },
            NativeError::Wrapped(err) => err,
        }
    }
}

impl From<MryaError> for NativeError {
    fn from(err: MryaError) -> Self {
        NativeError::Wrapped(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    #[test]
    fn test_kind_names_are_stable() {
        let token = Token::synthetic(TokenKind::Identifier, "x", 3);
        let cases = [
            (
                MryaError::Lexer {
                    line: 1,
                    message: "m".into(),
                },
                "LexerError",
            ),
            (MryaError::parse(&token, "m"), "ParseError"),
            (MryaError::runtime(&token, "m"), "RuntimeError"),
            (
                MryaError::TypeMismatch {
                    token: token.clone(),
                    message: "m".into(),
                },
                "TypeMismatch",
            ),
            (
                MryaError::Raised {
                    token: None,
                    message: "m".into(),
                },
                "RaisedError",
            ),
            (MryaError::class_function(&token, "m"), "ClassFunctionError"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.kind_name(), expected);
        }
    }

    #[test]
    fn test_line_attribution() {
        let token = Token::synthetic(TokenKind::Identifier, "x", 12);
        assert_eq!(MryaError::runtime(&token, "m").line(), Some(12));
        assert_eq!(MryaError::runtime_bare("m").line(), None);
        assert_eq!(
            MryaError::Lexer {
                line: 4,
                message: "m".into()
            }
            .line(),
            Some(4)
        );
    }

    #[test]
    fn test_native_error_attaches_call_site() {
        let token = Token::synthetic(TokenKind::RightParen, ")", 9);
        let err = NativeError::msg("boom").into_error(&token);
        assert_eq!(err.kind_name(), "RuntimeError");
        assert_eq!(err.line(), Some(9));

        let raised = NativeError::raised("bad").into_error(&token);
        assert_eq!(raised.kind_name(), "RaisedError");
    }
}
