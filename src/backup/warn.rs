use crate::backup::util::truncate_with_ellipsis;

#[derive(Debug, Clone, Copy)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub action: &'a str,
    pub chat: &'a str,
    pub message: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        truncate_with_ellipsis(trimmed, 240)
    }
}

pub fn render(event: &WarnEvent<'_>) -> String {
    format!(
        "CHATKEEP_WARN code={} stage={} action={} chat={} message={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.action),
        sanitize_value(event.chat),
        sanitize_value(event.message),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    )
}

pub fn emit(event: WarnEvent<'_>) {
    eprintln!("{}", render(&event));
}

/// Progress line for long-running commands.
pub fn progress(stage: &str, text: &str) {
    eprintln!("chatkeep {stage}: {text}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn render_keeps_every_field_on_one_line() {
        let line = render(&WarnEvent {
            code: "MEDIA_DOWNLOAD_FAILED",
            stage: "archive",
            action: "download-media",
            chat: "Team Chat",
            message: "ABC",
            reason: "",
            err: "timed out\nafter 30s",
        });
        assert!(!line.contains('\n'));
        assert!(line.contains("chat=Team_Chat"));
        assert!(line.contains("reason=na"));
        assert!(line.contains("err=timed_out_after_30s"));
    }
}
