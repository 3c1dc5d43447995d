// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;

/// Bounded tail of payload output
pub(crate) struct OutputTail {
    lines: VecDeque<String>,
    errors: VecDeque<String>,
    max_lines: usize,
    max_errors: usize,
}

impl OutputTail {
    pub(crate) fn new(max_lines: usize, max_errors: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            errors: VecDeque::new(),
            max_lines,
            max_errors,
        }
    }

    /// Every line enters the output tail; error lines are also kept separately
    pub(crate) fn push(&mut self, line: &str, is_error: bool) {
        push_bounded(&mut self.lines, line, self.max_lines);
        if is_error {
            push_bounded(&mut self.errors, line, self.max_errors);
        }
    }

    /// Up to `n` most recent lines, oldest first
    pub(crate) fn last(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.errors.iter().cloned().collect()
    }
}

fn push_bounded(buffer: &mut VecDeque<String>, line: &str, max: usize) {
    if max == 0 {
        return;
    }
    if buffer.len() == max {
        buffer.pop_front();
    }
    buffer.push_back(line.to_string());
}
