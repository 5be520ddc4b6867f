/*******************************************************************************
 *     ___                  _   ____  ____
 *    / _ \ _   _  ___  ___| |_|  _ \| __ )
 *   | | | | | | |/ _ \/ __| __| | | |  _ \
 *   | |_| | |_| |  __/\__ \ |_| |_| | |_) |
 *    \__\_\\__,_|\___||___/\__|____/|____/
 *
 *  Copyright (c) 2014-2019 Appsicle
 *  Copyright (c) 2019-2024 QuestDB
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *  http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 *
 ******************************************************************************/
use segcol_core::error::CoreError;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Cause of a segment read error.
#[derive(Debug, Clone)]
pub enum SegmentErrorCause {
    /// The logical type, encoding or codec has no reader.
    UnsupportedType,

    /// Malformed metadata, missing required index, bad page or checksum.
    Corruption,

    /// Seek beyond the ordinals stored in the column.
    NotFound,

    /// Invariant violation inside the reader or between its child columns.
    Internal,

    Encoding(parquet2::error::Error),
    Metadata(Arc<serde_json::Error>),
    Core(CoreError),
    Io(Arc<std::io::Error>),
}

impl SegmentErrorCause {
    pub fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentErrorCause::Encoding(err) => Some(err),
            SegmentErrorCause::Metadata(err) => Some(err.as_ref()),
            SegmentErrorCause::Core(err) => Some(err),
            SegmentErrorCause::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    #[track_caller]
    pub fn into_err(self) -> SegmentError {
        SegmentError::new(self)
    }
}

/// An error reading a column out of a segment.
#[derive(Clone)]
pub struct SegmentError {
    /// What caused the error.
    cause: SegmentErrorCause,

    /// Stack of additional contextual information,
    /// printed in reverse order.
    context: Vec<String>,

    backtrace: Arc<Backtrace>,
}

impl SegmentError {
    #[track_caller]
    pub fn new(cause: SegmentErrorCause) -> Self {
        Self {
            cause,
            context: Vec::new(),
            backtrace: Backtrace::capture().into(),
        }
    }

    #[track_caller]
    pub fn with_descr(cause: SegmentErrorCause, descr: impl Into<String>) -> Self {
        Self {
            cause,
            context: vec![descr.into()],
            backtrace: Backtrace::capture().into(),
        }
    }

    pub fn cause(&self) -> &SegmentErrorCause {
        &self.cause
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.cause, SegmentErrorCause::NotFound)
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self.cause, SegmentErrorCause::Corruption)
    }

    pub fn add_context(&mut self, context: impl Into<String>) {
        self.context.push(context.into());
    }
}

impl Display for SegmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let source = self.cause.source();
        let last_index = self.context.len().saturating_sub(1);
        for (index, context) in self.context.iter().rev().enumerate() {
            if index == last_index {
                write!(f, "{}", context)?;
            } else {
                write!(f, "{}: ", context)?;
            }
        }
        if let Some(source) = source {
            if self.context.is_empty() {
                write!(f, "{}", source)?;
            } else {
                write!(f, ": {}", source)?;
            }
        } else if self.context.is_empty() {
            write!(f, "{:?}", self.cause)?;
        }
        Ok(())
    }
}

impl Debug for SegmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SegmentError\n    Cause: {:?}", self.cause)?;
        writeln!(f, "    Context:")?;
        for line in self.context.iter().rev() {
            writeln!(f, "        {}", line)?;
        }
        if let BacktraceStatus::Captured = self.backtrace.status() {
            writeln!(f, "    Backtrace:\n{}", self.backtrace)?;
        }
        Ok(())
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.source()
    }
}

impl From<parquet2::error::Error> for SegmentError {
    fn from(source: parquet2::error::Error) -> Self {
        Self::new(SegmentErrorCause::Encoding(source))
    }
}

impl From<serde_json::Error> for SegmentError {
    fn from(source: serde_json::Error) -> Self {
        Self::new(SegmentErrorCause::Metadata(Arc::new(source)))
    }
}

impl From<CoreError> for SegmentError {
    fn from(source: CoreError) -> Self {
        Self::new(SegmentErrorCause::Core(source))
    }
}

impl From<std::io::Error> for SegmentError {
    fn from(e: std::io::Error) -> Self {
        Self::new(SegmentErrorCause::Io(Arc::new(e)))
    }
}

pub type SegmentResult<T> = Result<T, SegmentError>;

pub trait SegmentErrorExt<T> {
    fn context(self, context: &str) -> SegmentResult<T>;
    fn with_context<F>(self, context: F) -> SegmentResult<T>
    where
        F: FnOnce(&mut SegmentError) -> String;
}

impl<T, E> SegmentErrorExt<T> for Result<T, E>
where
    E: Into<SegmentError>,
{
    fn context(self, context: &str) -> SegmentResult<T> {
        match self {
            Ok(val) => Ok(val),
            Err(e) => {
                let mut err = e.into();
                err.add_context(context);
                Err(err)
            }
        }
    }

    fn with_context<F>(self, context: F) -> SegmentResult<T>
    where
        F: FnOnce(&mut SegmentError) -> String,
    {
        match self {
            Ok(val) => Ok(val),
            Err(e) => {
                let mut err = e.into();
                let context = context(&mut err);
                err.add_context(context);
                Err(err)
            }
        }
    }
}

macro_rules! fmt_err {
    ($cause: ident, $($arg:tt)*) => {
        crate::segment::error::SegmentError::with_descr(
            crate::segment::error::SegmentErrorCause::$cause,
            format!($($arg)*))
    };
}

pub(crate) use fmt_err;

#[cfg(test)]
mod tests {
    use super::*;
    use segcol_core::col_type::FieldType;

    #[test]
    fn test_context_is_printed_outermost_first() {
        let res: SegmentResult<()> = Err(fmt_err!(Corruption, "bad footer tag {}", 9));
        let err = res.context("column 3").unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.to_string(), "column 3: bad footer tag 9");
    }

    #[test]
    fn test_core_error_is_wrapped() {
        let res = FieldType::try_from(0u8).context("reading metadata");
        let err = res.unwrap_err();
        assert!(matches!(err.cause(), SegmentErrorCause::Core(_)));
        assert_eq!(
            err.to_string(),
            "reading metadata: unknown column type tag: 0"
        );
    }
}
