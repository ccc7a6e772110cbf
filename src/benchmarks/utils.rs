/// Split a command line into arguments
///
/// Whitespace separates arguments and double quotes group them. Inside a
/// quoted section three consecutive quotes produce one literal quote.
pub fn split_command(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote_count = 0;
    let mut in_quote = false;

    for c in line.chars() {
        if c == '"' {
            quote_count += 1;
            if quote_count == 3 {
                quote_count = 0;
                current.push(c);
            }
            continue;
        }
        if quote_count > 0 {
            if quote_count == 1 {
                in_quote = !in_quote;
            }
            quote_count = 0;
        }
        if !in_quote && c.is_whitespace() {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain() {
        assert_eq!(split_command("-t 30 -P 4"), vec!["-t", "30", "-P", "4"]);
        assert!(split_command("   ").is_empty());
        assert!(split_command("").is_empty());
    }

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_command(r#"--title "my run" -R"#),
            vec!["--title", "my run", "-R"]
        );
        assert_eq!(split_command(r#"a"b c"d"#), vec!["ab cd"]);
    }

    #[test]
    fn test_split_literal_quote() {
        assert_eq!(split_command(r#""say """hi""""#), vec![r#"say "hi""#]);
    }
}
