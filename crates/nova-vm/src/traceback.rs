//! Source locations and stack tracebacks.

use crate::callinfo::{CallInfo, FrameKind};
use crate::vm::Vm;

const LUA_IDSIZE: usize = 60;

/// Printable form of a chunk name, as used in messages:
/// `=name` verbatim, `@file` with long paths elided from the front, and
/// anything else as `[string "first line..."]`.
pub fn format_source_name(name: &str) -> String {
    if let Some(exact) = name.strip_prefix('=') {
        exact.chars().take(LUA_IDSIZE - 1).collect()
    } else if let Some(file) = name.strip_prefix('@') {
        let count = file.chars().count();
        if count >= LUA_IDSIZE {
            let tail: String = file.chars().skip(count - (LUA_IDSIZE - 4)).collect();
            format!("...{tail}")
        } else {
            file.to_string()
        }
    } else {
        // [string " + ..."] leaves 45 characters of content
        let max_content = LUA_IDSIZE - 1 - 14;
        let first_line = name.lines().next().unwrap_or("");
        if first_line.chars().count() > max_content || name.contains('\n') {
            let truncated: String = first_line.chars().take(max_content).collect();
            format!("[string \"{truncated}...\"]")
        } else {
            format!("[string \"{first_line}\"]")
        }
    }
}

impl Vm {
    fn frame_at(&self, level: usize) -> Option<&CallInfo> {
        let idx = self.call_stack.len().checked_sub(level + 1)?;
        self.call_stack.get(idx)
    }

    /// `chunk:line:` for the Lua frame `level` steps below the innermost
    /// one (0 is the innermost). Host frames and missing levels have no
    /// location.
    pub fn where_at(&self, level: usize) -> Option<String> {
        let frame = self.frame_at(level)?;
        let FrameKind::Lua { proto_idx } = frame.kind else {
            return None;
        };
        let proto = self.proto(proto_idx).ok()?;
        let source = format_source_name(&proto.source);
        if frame.current_line > 0 {
            Some(format!("{source}:{}:", frame.current_line))
        } else {
            Some(format!("{source}:"))
        }
    }

    fn describe_frame(&self, frame: &CallInfo) -> String {
        match frame.kind {
            FrameKind::Native { name } => format!("[C]: in function '{name}'"),
            FrameKind::Lua { proto_idx } => {
                let Ok(proto) = self.proto(proto_idx) else {
                    return "?: in ?".to_string();
                };
                let source = format_source_name(&proto.source);
                let location = if frame.current_line > 0 {
                    format!("{source}:{}:", frame.current_line)
                } else {
                    format!("{source}:")
                };
                let what = match &proto.name {
                    Some(name) => format!("function '{name}'"),
                    None if proto.is_main() => "main chunk".to_string(),
                    None => format!("function <{source}:{}>", proto.line_defined),
                };
                format!("{location} in {what}")
            }
        }
    }

    /// Render the active frames innermost first, skipping `level` of them.
    /// A `message`, when given, is placed on its own line before the
    /// header. Carriage returns never appear in the output.
    pub fn traceback(&self, message: Option<&str>, level: usize) -> String {
        let mut out = String::new();
        if let Some(msg) = message {
            out.push_str(msg);
            out.push('\n');
        }
        out.push_str("stack traceback:");
        for frame in self.call_stack.iter().rev().skip(level) {
            out.push_str("\n\t");
            out.push_str(&self.describe_frame(frame));
        }
        out.retain(|c| c != '\r');
        out
    }
}
