//! Quoting for command lines handed to `su -c`.

use shell_escape::unix::escape;
use std::borrow::Cow;
use std::path::Path;

/// Quotes one word so the root shell sees it verbatim.
pub fn quote(word: &str) -> Cow<'_, str> {
    escape(Cow::Borrowed(word))
}

/// Builds `<program> <args...>` with every word quoted.
pub fn command_line(program: &Path, args: &[&str]) -> String {
    let program = program.to_string_lossy();
    std::iter::once(quote(&program).into_owned())
        .chain(args.iter().map(|a| quote(a).into_owned()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_left_alone() {
        assert_eq!(
            command_line(Path::new("/data/local/tmp/gmsflags"), &["serve"]),
            "/data/local/tmp/gmsflags serve"
        );
    }

    #[test]
    fn metacharacters_are_single_quoted() {
        let line = command_line(Path::new("/data/app/x y/gmsflags"), &["serve"]);
        assert_eq!(line, "'/data/app/x y/gmsflags' serve");

        assert_eq!(quote("$(reboot)"), "'$(reboot)'");
    }
}
