mod common;

#[cfg(test)]
mod interpreter_tests {
    use std::io;

    use lox_interpreter as lox;

    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::scan_tokens;
    use lox::value::Value;
    use lox::{RunOutcome, EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};

    use crate::common::{run, run_ok, run_runtime_error, SharedBuffer};

    // ───────────────────────────── end‑to‑end programs ─────────────────────────────

    #[test]
    fn test_program_01_block_shadowing() {
        assert_eq!(
            run_ok("var a = 1; { var a = 2; print a; } print a;"),
            vec!["2", "1"]
        );
    }

    #[test]
    fn test_program_02_function_return() {
        assert_eq!(
            run_ok("fun add(a,b) { return a+b; } print add(1,2);"),
            vec!["3"]
        );
    }

    #[test]
    fn test_program_03_initializer_and_method() {
        let source = "class Foo { init(x) { this.x = x; } getX() { return this.x; } } \
                      var f = Foo(5); print f.getX();";

        assert_eq!(run_ok(source), vec!["5"]);
    }

    #[test]
    fn test_program_04_type_error_halts_before_print() {
        let (output, message) = run_runtime_error("print 1 + \"a\";");

        assert_eq!(output, "");
        assert_eq!(
            message,
            "Operands must be two numbers or two strings.\n[line 1]"
        );
    }

    #[test]
    fn test_program_05_counter_closure() {
        let source = "fun makeCounter() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } \
                      var c = makeCounter(); print c(); print c();";

        assert_eq!(run_ok(source), vec!["1", "2"]);
    }

    #[test]
    fn test_program_06_equality_never_coerces() {
        assert_eq!(
            run_ok("print nil == nil; print 0 == false;"),
            vec!["true", "false"]
        );
    }

    // ───────────────────────────── values and operators ─────────────────────────────

    #[test]
    fn test_values_01_printing() {
        let source = r#"
            print 3.0;
            print 2.5;
            print "text";
            print true;
            print nil;
            print clock;
            print print;
            fun f() {}
            print f;
            class A {}
            print A;
            print A();
        "#;

        assert_eq!(
            run_ok(source),
            vec![
                "3",
                "2.5",
                "text",
                "true",
                "nil",
                "<native fn clock>",
                "<native fn print>",
                "<fn f>",
                "A",
                "A instance",
            ]
        );
    }

    #[test]
    fn test_values_02_arithmetic_and_comparison() {
        let source = r#"
            print 1 + 2 * 3;
            print 3 * (1 + 2);
            print 10 / 4;
            print -(2 - 5);
            print 1 < 2;
            print 2 <= 1;
            print "a" + "b";
            print !nil;
            print !0;
            print "a" != "b";
        "#;

        assert_eq!(
            run_ok(source),
            vec!["7", "9", "2.5", "3", "true", "false", "ab", "true", "false", "true"]
        );
    }

    #[test]
    fn test_values_03_division_follows_ieee() {
        assert_eq!(
            run_ok("print 1 / 0; print -1 / 0; print 0 / 0;"),
            vec!["inf", "-inf", "nan"]
        );
    }

    #[test]
    fn test_values_04_logical_operators_return_operands() {
        let source = r#"
            print nil or "yes";
            print 1 and 2;
            print false and undefined;
            print "first" or undefined;
            print nil or false;
        "#;

        assert_eq!(run_ok(source), vec!["yes", "2", "false", "first", "false"]);
    }

    #[test]
    fn test_values_05_clock_returns_milliseconds() {
        assert_eq!(run_ok("var t = clock(); print t > 0;"), vec!["true"]);
    }

    // ───────────────────────────── control flow ─────────────────────────────

    #[test]
    fn test_flow_01_loops() {
        let source = r#"
            var sum = 0;
            for (var i = 1; i <= 10; i = i + 1) sum = sum + i;
            print sum;

            var n = 3;
            while (n > 0) { print n; n = n - 1; }
        "#;

        assert_eq!(run_ok(source), vec!["55", "3", "2", "1"]);
    }

    #[test]
    fn test_flow_02_if_else_and_truthiness() {
        let source = r#"
            if (0) print "zero is truthy"; else print "no";
            if (nil) print "no"; else print "nil is falsy";
            if ("") print "empty string is truthy";
        "#;

        assert_eq!(
            run_ok(source),
            vec!["zero is truthy", "nil is falsy", "empty string is truthy"]
        );
    }

    #[test]
    fn test_flow_03_return_unwinds_loops() {
        let source = r#"
            fun find() {
                var i = 0;
                while (true) {
                    if (i == 3) return i;
                    i = i + 1;
                }
            }
            print find();
        "#;

        assert_eq!(run_ok(source), vec!["3"]);
    }

    #[test]
    fn test_flow_04_recursion() {
        let source = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(15);
        "#;

        assert_eq!(run_ok(source), vec!["610"]);
    }

    #[test]
    fn test_flow_05_function_without_return_yields_nil() {
        assert_eq!(run_ok("fun f() {} print f();"), vec!["nil"]);
    }

    // ───────────────────────────── scoping ─────────────────────────────

    #[test]
    fn test_scope_01_closures_bind_statically() {
        let source = r#"
            var a = "global";
            {
                fun show() { print a; }
                show();
                var a = "block";
                show();
            }
        "#;

        assert_eq!(run_ok(source), vec!["global", "global"]);
    }

    #[test]
    fn test_scope_02_counters_are_independent() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun inc() { i = i + 1; return i; }
                return inc;
            }
            var a = makeCounter();
            var b = makeCounter();
            a(); a();
            print a();
            print b();
        "#;

        assert_eq!(run_ok(source), vec!["3", "1"]);
    }

    #[test]
    fn test_scope_03_each_iteration_gets_its_own_block() {
        let source = r#"
            var first;
            var second;
            for (var i = 0; i < 2; i = i + 1) {
                var j = i;
                fun show() { print j; }
                if (first == nil) first = show; else second = show;
            }
            first();
            second();
        "#;

        assert_eq!(run_ok(source), vec!["0", "1"]);
    }

    #[test]
    fn test_scope_04_globals_resolve_late() {
        let source = r#"
            fun f() { return later; }
            var later = "ok";
            print f();
        "#;

        assert_eq!(run_ok(source), vec!["ok"]);
    }

    #[test]
    fn test_scope_05_assignment_is_an_expression() {
        assert_eq!(
            run_ok("var a; var b; a = b = 4; print a; print b;"),
            vec!["4", "4"]
        );
    }

    // ───────────────────────────── classes ─────────────────────────────

    #[test]
    fn test_class_01_inheritance_and_super() {
        let source = r#"
            class A {
                hi() { return "A"; }
                who() { return "A.who"; }
            }
            class B < A {
                hi() { return "B+" + super.hi(); }
            }
            var b = B();
            print b.hi();
            print b.who();
        "#;

        assert_eq!(run_ok(source), vec!["B+A", "A.who"]);
    }

    #[test]
    fn test_class_02_inherited_initializer_sets_arity() {
        let source = r#"
            class A { init(x) { this.x = x; } }
            class B < A {}
            print B(3).x;
        "#;

        assert_eq!(run_ok(source), vec!["3"]);

        let (_, message) = run_runtime_error(
            "class A { init(x) {} } class B < A {} B();",
        );
        assert_eq!(message, "Expected 1 arguments but got 0.\n[line 1]");
    }

    #[test]
    fn test_class_03_init_always_yields_instance() {
        let source = r#"
            class C {
                init() { this.n = 1; return; }
            }
            var c = C();
            print c.init();
            print c.n;
        "#;

        assert_eq!(run_ok(source), vec!["C instance", "1"]);

        assert_eq!(
            run_ok("class C { init(x) { this.x = x; } } print C(5);"),
            vec!["C instance"]
        );
    }

    #[test]
    fn test_class_04_fields_shadow_methods() {
        let source = r#"
            class A { m() { return "method"; } }
            var a = A();
            print a.m();
            a.m = "field";
            print a.m;
        "#;

        assert_eq!(run_ok(source), vec!["method", "field"]);
    }

    #[test]
    fn test_class_05_bound_methods_keep_their_receiver() {
        let source = r#"
            class Person {
                init(name) { this.name = name; }
                greet() { return "hi " + this.name; }
            }
            var greet = Person("ana").greet;
            print greet();
        "#;

        assert_eq!(run_ok(source), vec!["hi ana"]);
    }

    #[test]
    fn test_class_06_identity_equality() {
        let source = r#"
            class A { m() {} }
            var a = A();
            var b = A();
            print a == a;
            print a == b;
            print a.m == a.m;
            print A == A;
        "#;

        assert_eq!(run_ok(source), vec!["true", "false", "false", "true"]);
    }

    // ───────────────────────────── print forms ─────────────────────────────

    #[test]
    fn test_print_01_call_form_and_value() {
        assert_eq!(
            run_ok("print(\"called\"); var r = print(1); print r;"),
            vec!["called", "1", "nil"]
        );
    }

    #[test]
    fn test_print_02_parenthesised_operand_is_a_call() {
        // `print (1)+2;` calls print first, then adds 2 to its nil result.
        let (output, message) = run_runtime_error("print (1)+2;");

        assert_eq!(output, "1\n");
        assert_eq!(
            message,
            "Operands must be two numbers or two strings.\n[line 1]"
        );
    }

    // ───────────────────────────── runtime errors ─────────────────────────────

    #[test]
    fn test_errors_01_output_before_failure_is_kept() {
        let (output, message) = run_runtime_error("print 1;\nprint -\"x\";\nprint 2;");

        assert_eq!(output, "1\n");
        assert_eq!(message, "Operand must be a number.\n[line 2]");
    }

    #[test]
    fn test_errors_02_messages() {
        let cases = [
            ("print 1 < \"a\";", "Operands must be numbers.\n[line 1]"),
            ("print missing;", "Undefined variable 'missing'.\n[line 1]"),
            ("missing = 1;", "Undefined variable 'missing'.\n[line 1]"),
            ("fun f(a) {} f();", "Expected 1 arguments but got 0.\n[line 1]"),
            ("\"x\"();", "Can only call functions and classes.\n[line 1]"),
            ("class A {} A().x;", "Undefined property 'x'.\n[line 1]"),
            ("var a = 1; a.x;", "Only instances have properties.\n[line 1]"),
            ("var a = 1; a.x = 2;", "Only instances have fields.\n[line 1]"),
            ("var A = 1; class B < A {}", "Superclass must be a class.\n[line 1]"),
            (
                "class A {} class B < A { m() { return super.m(); } } B().m();",
                "Undefined property 'm'.\n[line 1]",
            ),
        ];

        for (source, expected) in cases {
            let (_, message) = run_runtime_error(source);
            assert_eq!(message, expected, "for source {:?}", source);
        }
    }

    #[test]
    fn test_errors_03_unbounded_recursion_overflows() {
        let (_, message) = run_runtime_error("fun f() { f(); }\nf();");

        assert_eq!(message, "Stack overflow.\n[line 1]");
    }

    #[test]
    fn test_errors_04_configurable_call_depth() {
        let source = "fun down(n) { if (n > 0) down(n - 1); } down(20); print \"done\";";

        let buffer = SharedBuffer::default();
        let outcome = lox::run_with_depth(source, Box::new(buffer.clone()), 64);
        assert!(matches!(outcome, RunOutcome::Ok));
        assert_eq!(buffer.contents(), "done\n");

        let buffer = SharedBuffer::default();
        let outcome = lox::run_with_depth(source, Box::new(buffer.clone()), 8);
        assert!(matches!(outcome, RunOutcome::RuntimeError(_)));
        assert_eq!(buffer.contents(), "");
    }

    // ───────────────────────────── outcomes ─────────────────────────────

    #[test]
    fn test_outcome_01_exit_codes() {
        let (_, ok) = run("print 1;");
        assert_eq!(ok.exit_code(), 0);
        assert!(ok.diagnostics().is_empty());

        let (_, static_error) = run("var = 1;");
        assert_eq!(static_error.exit_code(), EXIT_STATIC_ERROR);
        assert!(static_error.diagnostics().iter().all(|e| e.is_static()));
        assert_eq!(static_error.diagnostics()[0].line(), Some(1));

        let (_, runtime_error) = run("print 1;\nnil();");
        assert_eq!(runtime_error.exit_code(), EXIT_RUNTIME_ERROR);
        assert!(runtime_error.diagnostics()[0].is_runtime());
        assert_eq!(runtime_error.diagnostics()[0].line(), Some(2));
    }

    #[test]
    fn test_outcome_02_lexical_and_syntax_errors_are_reported_together() {
        let (output, outcome) = run("var a = @;\nvar = 2;");

        assert_eq!(output, "");

        let messages: Vec<String> = outcome
            .diagnostics()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            messages,
            vec![
                "[line 1] Error: Unexpected character: @",
                "[line 1] Error at ';': Expected expression.",
                "[line 2] Error at '=': Expected variable name.",
            ]
        );
    }

    // ───────────────────────────── deep nesting ─────────────────────────────

    const DEPTH: usize = 3000;

    #[test]
    fn test_nesting_01_grouping() {
        let source = format!("print {}1{};", "(".repeat(DEPTH), ")".repeat(DEPTH));

        assert_eq!(run_ok(&source), vec!["1"]);
    }

    #[test]
    fn test_nesting_02_unary() {
        let source = format!("print {}1;", "-".repeat(DEPTH));

        assert_eq!(run_ok(&source), vec!["1"]);
    }

    #[test]
    fn test_nesting_03_blocks() {
        let source = format!("{}print 1;{}", "{".repeat(DEPTH), "}".repeat(DEPTH));

        assert_eq!(run_ok(&source), vec!["1"]);
    }

    #[test]
    fn test_nesting_04_assignment_chain() {
        let source = format!("var a; {}1; print a;", "a = ".repeat(DEPTH));

        assert_eq!(run_ok(&source), vec!["1"]);
    }

    // ───────────────────────────── embedding ─────────────────────────────

    #[test]
    fn test_embedding_01_input_and_globals() {
        let source = "class A {} class B < A {} var h = read(); var i = read(); var end = read();";

        let (tokens, _) = scan_tokens(source);
        let (statements, errors) = Parser::new(&tokens).parse();
        assert!(errors.is_empty());

        let output = SharedBuffer::default();
        let mut interpreter = Interpreter::with_output(Box::new(output.clone()))
            .with_input(Box::new(io::Cursor::new(b"hi".to_vec())));

        assert!(Resolver::new(&mut interpreter).resolve(&statements).is_empty());
        interpreter.interpret(&statements).unwrap();

        let globals = interpreter.globals().borrow();

        assert_eq!(globals.get_local("h"), Some(Value::Number(104.0)));
        assert_eq!(globals.get_local("i"), Some(Value::Number(105.0)));
        assert_eq!(globals.get_local("end"), Some(Value::Number(-1.0)));
        assert_eq!(
            globals.get_local("read").map(|v| v.to_string()),
            Some("<native fn read>".to_string())
        );

        match globals.get_local("B") {
            Some(Value::Class(class)) => {
                assert_eq!(class.superclass().map(|s| s.name()), Some("A"));
            }
            other => panic!("expected class B, got {:?}", other),
        }

        assert_eq!(output.contents(), "");
    }
}
