//! Line/token scanner. Bee assembly has no register operands and only a
//! handful of directives, so a hand-rolled scanner replaces the PEG
//! grammar `vasm` uses for the richer VCPU assembly language.

/// One non-blank, comment-stripped source line, split into whitespace- and
/// comma-separated tokens. `number` is 1-based, matching how editors and
/// `rustc` report line numbers, for use in [`crate::error::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: u32,
    pub tokens: Vec<String>,
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}

pub fn scan(input: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let number = (index + 1) as u32;
        let code = strip_comment(raw);
        let tokens: Vec<String> = code
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| token.to_owned())
            .collect();
        if !tokens.is_empty() {
            lines.push(Line { number, tokens });
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_blank_lines() {
        let lines = scan("nop # does nothing\n\n   \nadd\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[0].tokens, vec!["nop"]);
        assert_eq!(lines[1].number, 4);
        assert_eq!(lines[1].tokens, vec!["add"]);
    }

    #[test]
    fn splits_on_commas_and_whitespace() {
        let lines = scan(".word 1, -2,\t3");
        assert_eq!(lines[0].tokens, vec![".word", "1", "-2", "3"]);
    }

    #[test]
    fn keeps_labels_attached_to_their_colon() {
        let lines = scan("loop: pushi 1");
        assert_eq!(lines[0].tokens, vec!["loop:", "pushi", "1"]);
    }
}
