/// The arguments after the first one equal to `token`, or all of `args`
/// when `token` does not occur.
///
/// Useful for dropping whatever a test harness or debugger put in front of
/// the program's own flags, e.g. everything up to `"--"`.
pub fn args_after_token<'a, S: AsRef<str>>(token: &str, args: &'a [S]) -> &'a [S] {
    match args.iter().position(|arg| arg.as_ref() == token) {
        Some(index) => &args[index + 1..],
        None => args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_after_first_match() {
        let args = ["go", "get", "-t", "-v", "github.com/pkg/...", "#gosetup"];
        assert_eq!(args_after_token("-v", &args), ["github.com/pkg/...", "#gosetup"]);
    }

    #[test]
    fn debugger_separator() {
        let args: Vec<String> = [
            "dlv",
            "--listen=localhost:43235",
            "exec",
            "/tmp/bin",
            "--",
            "-test.v",
            "-test.run",
            "^TestSuite$",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(args_after_token("--", &args), ["-test.v", "-test.run", "^TestSuite$"]);
    }

    #[test]
    fn missing_token_keeps_everything() {
        let args = ["app", "--port", "80"];
        assert_eq!(args_after_token("BLARGH", &args), args);
    }

    #[test]
    fn token_at_end_leaves_nothing() {
        let args = ["app", "--"];
        assert!(args_after_token("--", &args).is_empty());
    }
}
