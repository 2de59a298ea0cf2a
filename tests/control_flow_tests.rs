// Control-flow execution and runtime-error tests.

use rascal::executor::errors::RuntimeError;
use rascal::executor::io::RuntimeConsole;
use rascal::executor::Executor;
use rascal::parser::Parser;
use rascal::scanner::source::SourceBuffer;
use rascal::scanner::Scanner;

/// Run `f` on a thread with a large native stack. The interpreter recurses in
/// Rust for each interpreted call, so deeply-recursive programs (which the
/// interpreter itself catches via its bounded runtime stack) need more native
/// stack than the 2 MiB default test thread provides.
fn with_big_stack<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    std::thread::scope(|scope| {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn_scoped(scope, f)
            .expect("spawn worker thread")
            .join()
            .expect("worker thread panicked")
    })
}

fn run(source: &str) -> String {
    with_big_stack(|| {
        let parser = Parser::new(Scanner::new(SourceBuffer::from_text(source)));
        let translation = parser.parse_program().expect("translation aborted");
        assert_eq!(
            translation.error_count, 0,
            "unexpected syntax errors in test program"
        );
        let mut executor = Executor::new(&translation, RuntimeConsole::new(""));
        let result = executor.run();
        assert!(result.is_ok(), "execution failed: {:?}", result);
        executor.output().to_string()
    })
}

fn run_expecting_error(source: &str) -> RuntimeError {
    with_big_stack(|| {
        let parser = Parser::new(Scanner::new(SourceBuffer::from_text(source)));
        let translation = parser.parse_program().expect("translation aborted");
        assert_eq!(
            translation.error_count, 0,
            "unexpected syntax errors in test program"
        );
        let mut executor = Executor::new(&translation, RuntimeConsole::new(""));
        executor
            .run()
            .expect_err("expected a runtime error, but execution succeeded")
    })
}

#[test]
fn test_repeat_until() {
    let output = run(
        r#"
        program t;
        var i, sum: integer;
        begin
            i := 1;
            sum := 0;
            repeat
                sum := sum + i;
                i := i + 1
            until i > 5;
            writeln(sum)
        end.
        "#,
    );
    assert_eq!(output, "15\n");
}

#[test]
fn test_repeat_body_runs_at_least_once() {
    let output = run(
        r#"
        program t;
        var i: integer;
        begin
            i := 99;
            repeat
                writeln(i)
            until i > 0
        end.
        "#,
    );
    assert_eq!(output, "99\n");
}

#[test]
fn test_while_loop() {
    let output = run(
        r#"
        program t;
        var n, count: integer;
        begin
            n := 20;
            count := 0;
            while n > 1 do
            begin
                n := n div 2;
                count := count + 1
            end;
            writeln(count)
        end.
        "#,
    );
    assert_eq!(output, "4\n");
}

#[test]
fn test_while_false_skips_body() {
    let output = run(
        r#"
        program t;
        begin
            while 1 > 2 do
                writeln('never');
            writeln('done')
        end.
        "#,
    );
    assert_eq!(output, "done\n");
}

#[test]
fn test_if_then_else_both_paths() {
    let output = run(
        r#"
        program t;
        var i: integer;
        begin
            for i := 1 to 4 do
                if odd(i) then
                    write('o')
                else
                    write('e');
            writeln
        end.
        "#,
    );
    assert_eq!(output, "oeoe\n");
}

#[test]
fn test_if_without_else() {
    let output = run(
        r#"
        program t;
        begin
            if 1 < 2 then writeln('yes');
            if 2 < 1 then writeln('no');
            writeln('end')
        end.
        "#,
    );
    assert_eq!(output, "yes\nend\n");
}

#[test]
fn test_boolean_operators() {
    let output = run(
        r#"
        program t;
        begin
            if (1 < 2) and (3 < 4) then writeln('and');
            if (1 > 2) or (3 < 4) then writeln('or');
            if not (1 > 2) then writeln('not')
        end.
        "#,
    );
    assert_eq!(output, "and\nor\nnot\n");
}

#[test]
fn test_for_to_and_downto() {
    let output = run(
        r#"
        program t;
        var i: integer;
        begin
            for i := 1 to 5 do write(i);
            writeln;
            for i := 5 downto 1 do write(i);
            writeln
        end.
        "#,
    );
    assert_eq!(output, "12345\n54321\n");
}

#[test]
fn test_for_empty_range() {
    let output = run(
        r#"
        program t;
        var i: integer;
        begin
            for i := 3 to 1 do write(i);
            writeln('empty')
        end.
        "#,
    );
    assert_eq!(output, "empty\n");
}

#[test]
fn test_nested_loops() {
    let output = run(
        r#"
        program t;
        var i, j: integer;
        begin
            for i := 1 to 3 do
            begin
                for j := 1 to i do write('*');
                writeln
            end
        end.
        "#,
    );
    assert_eq!(output, "*\n**\n***\n");
}

#[test]
fn test_case_selects_branch() {
    let output = run(
        r#"
        program t;
        var x: integer;
        begin
            x := 2;
            case x of
                1: writeln('one');
                2: writeln('two');
                3: writeln('three')
            end
        end.
        "#,
    );
    assert_eq!(output, "two\n");
}

#[test]
fn test_case_multiple_labels_per_branch() {
    let output = run(
        r#"
        program t;
        var i: integer;
        begin
            for i := 1 to 5 do
                case i of
                    1, 3, 5: write('o');
                    2, 4:    write('e')
                end;
            writeln
        end.
        "#,
    );
    assert_eq!(output, "oeoeo\n");
}

#[test]
fn test_case_on_char() {
    let output = run(
        r#"
        program t;
        var c: char;
        begin
            c := 'b';
            case c of
                'a': writeln('first');
                'b': writeln('second')
            end
        end.
        "#,
    );
    assert_eq!(output, "second\n");
}

#[test]
fn test_case_with_negative_label() {
    let output = run(
        r#"
        program t;
        var x: integer;
        begin
            x := -1;
            case x of
                -1: writeln('minus');
                1:  writeln('plus')
            end
        end.
        "#,
    );
    assert_eq!(output, "minus\n");
}

#[test]
fn test_case_unmatched_selector_is_an_error() {
    let error = run_expecting_error(
        r#"
        program t;
        var x: integer;
        begin
            x := 9;
            case x of
                1: writeln('one')
            end
        end.
        "#,
    );
    assert!(
        matches!(error, RuntimeError::InvalidCaseValue { value: 9, .. }),
        "unexpected error: {:?}",
        error
    );
}

#[test]
fn test_integer_division_by_zero() {
    let error = run_expecting_error(
        r#"
        program t;
        var z: integer;
        begin
            z := 0;
            writeln(10 div z)
        end.
        "#,
    );
    assert!(matches!(error, RuntimeError::DivisionByZero { .. }));
}

#[test]
fn test_real_division_by_zero() {
    let error = run_expecting_error(
        r#"
        program t;
        var z: integer;
        begin
            z := 0;
            writeln(1 / z)
        end.
        "#,
    );
    assert!(matches!(error, RuntimeError::DivisionByZero { .. }));
}

#[test]
fn test_subrange_store_out_of_range() {
    let error = run_expecting_error(
        r#"
        program t;
        var small: 1..5;
            i: integer;
        begin
            i := 9;
            small := i
        end.
        "#,
    );
    assert!(
        matches!(
            error,
            RuntimeError::ValueOutOfRange {
                value: 9,
                min: 1,
                max: 5,
                ..
            }
        ),
        "unexpected error: {:?}",
        error
    );
}

#[test]
fn test_array_index_out_of_range() {
    let error = run_expecting_error(
        r#"
        program t;
        var a: array [1..3] of integer;
            i: integer;
        begin
            i := 7;
            a[i] := 0
        end.
        "#,
    );
    assert!(matches!(
        error,
        RuntimeError::ValueOutOfRange {
            value: 7,
            min: 1,
            max: 3,
            ..
        }
    ));
}

#[test]
fn test_uninitialized_read_is_an_error() {
    let error = run_expecting_error(
        r#"
        program t;
        var x, y: integer;
        begin
            y := x
        end.
        "#,
    );
    assert!(matches!(error, RuntimeError::UninitializedValue { .. }));
}

#[test]
fn test_runaway_recursion_overflows_the_stack() {
    let error = run_expecting_error(
        r#"
        program t;

        function f(n: integer): integer;
        var a, b, c, d, e, g, h, i, j, k, l, m, o, p, q, r: integer;
        begin
            f := f(n + 1)
        end;

        begin
            writeln(f(1))
        end.
        "#,
    );
    assert!(matches!(error, RuntimeError::StackOverflow { .. }));
}

#[test]
fn test_invalid_standard_function_argument() {
    let error = run_expecting_error(
        r#"
        program t;
        var x: integer;
        begin
            x := 300;
            writeln(chr(x))
        end.
        "#,
    );
    assert!(matches!(
        error,
        RuntimeError::InvalidFunctionArgument { name: "chr", .. }
    ));
}

#[test]
fn test_sqrt_of_negative_is_an_error() {
    let error = run_expecting_error(
        r#"
        program t;
        var x: real;
        begin
            x := -4.0;
            writeln(sqrt(x))
        end.
        "#,
    );
    assert!(matches!(
        error,
        RuntimeError::InvalidFunctionArgument { name: "sqrt", .. }
    ));
}

#[test]
fn test_runtime_error_reports_source_line() {
    let error = run_expecting_error(
        "program t;\nvar z: integer;\nbegin\n    z := 0;\n    z := 1 div z\nend.",
    );
    assert!(matches!(error, RuntimeError::DivisionByZero { .. }));
    assert_eq!(error.line(), 5);
}

#[test]
fn test_case_inside_loop_repeats_dispatch() {
    let output = run(
        r#"
        program t;
        var i, total: integer;
        begin
            total := 0;
            for i := 1 to 6 do
                case i of
                    1, 2: total := total + 1;
                    3, 4: total := total + 10;
                    5, 6: total := total + 100
                end;
            writeln(total)
        end.
        "#,
    );
    assert_eq!(output, "222\n");
}
