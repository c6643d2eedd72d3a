#[cfg(test)]
mod scanner_tests {
    use lox_interpreter as lox;

    use lox::error::{LoxError, Result};
    use lox::scanner::*;
    use lox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    fn assert_token_matches(
        result: &Result<Token<'_>>,
        expected_type: TokenType,
        expected_lexeme: &str,
    ) {
        match result {
            Ok(token) => {
                assert_eq!(
                    token.token_type, expected_type,
                    "Expected token type {:?}, got {:?}",
                    expected_type, token.token_type
                );
                assert_eq!(
                    token.lexeme, expected_lexeme,
                    "Expected lexeme '{}', got '{}'",
                    expected_lexeme, token.lexeme
                );
            }
            Err(e) => panic!("Expected token but got error: {}", e),
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_char_operators() {
        assert_token_sequence(
            "! != = == < <= > >= /",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::SLASH, "/"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "class fun var_ print orchid or _x1 this super",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::FUN, "fun"),
                (TokenType::IDENTIFIER, "var_"),
                (TokenType::IDENTIFIER, "print"),
                (TokenType::IDENTIFIER, "orchid"),
                (TokenType::OR, "or"),
                (TokenType::IDENTIFIER, "_x1"),
                (TokenType::THIS, "this"),
                (TokenType::SUPER, "super"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_numbers() {
        let (tokens, errors) = scan_tokens("123 45.67 8. .5");
        assert!(errors.is_empty());

        let kinds: Vec<String> = tokens.iter().map(ToString::to_string).collect();

        assert_eq!(
            kinds,
            vec![
                "NUMBER 123 123.0",
                "NUMBER 45.67 45.67",
                "NUMBER 8 8.0",
                "DOT . null",
                "DOT . null",
                "NUMBER 5 5.0",
                "EOF  null",
            ]
        );
    }

    #[test]
    fn test_scanner_05_strings_and_lines() {
        let (tokens, errors) = scan_tokens("\"hi\"\n\"multi\nline\" x");
        assert!(errors.is_empty());

        assert_eq!(tokens[0].token_type, TokenType::STRING(String::new()));
        assert_eq!(tokens[0].to_string(), "STRING \"hi\" hi");
        assert_eq!(tokens[0].line, 1);

        match &tokens[1].token_type {
            TokenType::STRING(s) => assert_eq!(s, "multi\nline"),
            other => panic!("expected string, got {:?}", other),
        }

        assert_eq!(tokens[2].lexeme, "x");
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn test_scanner_06_comments_are_skipped() {
        let (tokens, errors) = scan_tokens("a // ignored ( { \"\nb");
        assert!(errors.is_empty());

        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme).collect();
        assert_eq!(lexemes, vec!["a", "b", ""]);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_unterminated_string_reports_and_ends() {
        let (tokens, errors) = scan_tokens("var s = \"open\nstill open");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line 2] Error: Unterminated string.");
        assert!(matches!(errors[0], LoxError::Lex { line: 2, .. }));

        assert_eq!(tokens.last().map(|t| t.token_type.clone()), Some(TokenType::EOF));
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source);

        let results: Vec<_> = scanner.collect();

        // 0: COMMA ','
        // 1: DOT '.'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            errors,
            vec![
                "[line 1] Error: Unexpected character: $",
                "[line 1] Error: Unexpected character: #",
            ]
        );
    }

    #[test]
    fn test_non_ascii_character_reported_once() {
        let (tokens, errors) = scan_tokens("a é b");

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "[line 1] Error: Unexpected character: é"
        );

        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme).collect();
        assert_eq!(lexemes, vec!["a", "b", ""]);
    }

    #[test]
    fn test_tokens_serialize_to_json() {
        let (tokens, _) = scan_tokens("x");
        let json = serde_json::to_string(&tokens[0]).unwrap();

        assert_eq!(json, r#"{"token_type":"IDENTIFIER","lexeme":"x","line":1}"#);
    }
}
