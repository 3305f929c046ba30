//! Small string helpers used by the command layer.

/// Separator between entries of a command list.
pub const LIST_SEPARATOR: char = '\x01';

/// Returns true if `cmd` is one of the `\x01`-separated entries of `list`.
///
/// Comparison ignores ASCII case. A missing list or command never matches.
pub fn array_contains(list: Option<&str>, cmd: Option<&str>) -> bool {
    let (Some(list), Some(cmd)) = (list, cmd) else {
        return false;
    };
    list.split(LIST_SEPARATOR)
        .any(|entry| entry.eq_ignore_ascii_case(cmd))
}

/// Case-insensitive (ASCII) string equality.
pub fn scmp(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Uppercases `s` and strips everything that isn't a hex digit.
pub fn format_hex(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Strips everything that isn't a decimal digit.
pub fn format_dec(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_any_entry_ignoring_case() {
        let list = "bp\x01bpx\x01SetBPX";
        assert!(array_contains(Some(list), Some("bp")));
        assert!(array_contains(Some(list), Some("BPX")));
        assert!(array_contains(Some(list), Some("setbpx")));
        assert!(!array_contains(Some(list), Some("bpd")));
        assert!(!array_contains(Some(list), Some("bp\x01bpx")));
    }

    #[test]
    fn single_entry_list() {
        assert!(array_contains(Some("run"), Some("RUN")));
        assert!(!array_contains(Some("run"), Some("ru")));
    }

    #[test]
    fn missing_arguments_never_match() {
        assert!(!array_contains(None, Some("bp")));
        assert!(!array_contains(Some("bp"), None));
        assert!(!array_contains(None, None));
    }

    #[test]
    fn empty_entries_match_empty_command() {
        assert!(array_contains(Some("a\x01\x01b"), Some("")));
        assert!(!array_contains(Some("a\x01b"), Some("")));
    }

    #[test]
    fn scmp_ignores_case() {
        assert!(scmp("Kernel32.DLL", "kernel32.dll"));
        assert!(!scmp("kernel32", "kernel32.dll"));
    }

    #[test]
    fn hex_and_dec_filters() {
        assert_eq!(format_hex("0x7ff6`1234 abz"), "07FF61234AB");
        assert_eq!(format_hex("ghij"), "");
        assert_eq!(format_dec("1,234.5e6"), "123456");
        assert_eq!(format_dec(""), "");
    }
}
