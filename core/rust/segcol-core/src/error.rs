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
use std::fmt::{Debug, Display, Formatter};

/// Cause of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCause {
    InvalidColumnType,
    InvalidValue,
}

/// An error interpreting column types or values.
///
/// Carries no backtrace of its own: it is wrapped into the reader's error,
/// which captures one at the conversion.
#[derive(Clone)]
pub struct CoreError {
    cause: CoreErrorCause,
    descr: String,
}

impl CoreError {
    pub fn with_descr(cause: CoreErrorCause, descr: impl Into<String>) -> Self {
        Self { cause, descr: descr.into() }
    }

    pub fn cause(&self) -> CoreErrorCause {
        self.cause
    }
}

impl Debug for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoreError({:?}: {})", self.cause, self.descr)
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.descr)
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;

macro_rules! fmt_err {
    ($cause: ident, $($arg:tt)*) => {
        crate::error::CoreError::with_descr(
            crate::error::CoreErrorCause::$cause,
            format!($($arg)*))
    };
}

pub(crate) use fmt_err;
