// Integration tests: translate and execute whole programs, asserting on the
// captured runtime output.

use rascal::executor::io::RuntimeConsole;
use rascal::executor::Executor;
use rascal::parser::Parser;
use rascal::scanner::source::SourceBuffer;
use rascal::scanner::Scanner;

fn run_with_input(source: &str, input: &str) -> String {
    let parser = Parser::new(Scanner::new(SourceBuffer::from_text(source)));
    let translation = parser.parse_program().expect("translation aborted");
    assert_eq!(
        translation.error_count, 0,
        "unexpected syntax errors in test program"
    );

    let mut executor = Executor::new(&translation, RuntimeConsole::new(input));
    let result = executor.run();
    assert!(result.is_ok(), "execution failed: {:?}", result);
    executor.output().to_string()
}

fn run(source: &str) -> String {
    run_with_input(source, "")
}

#[test]
fn test_arithmetic_precedence() {
    let output = run("program t; begin writeln(2 + 3 * 4) end.");
    assert_eq!(output, "14\n");
}

#[test]
fn test_variables_and_assignment() {
    let output = run(
        r#"
        program t;
        var x, y: integer;
        begin
            x := 5;
            y := x * 2 - 3;
            writeln(y)
        end.
        "#,
    );
    assert_eq!(output, "7\n");
}

#[test]
fn test_real_division_and_promotion() {
    let output = run("program t; var r: real; begin r := 1 / 2; writeln(r) end.");
    assert_eq!(output, "0.5\n");
}

#[test]
fn test_integer_widens_into_real_variable() {
    let output = run("program t; var r: real; begin r := 3; writeln(r) end.");
    assert_eq!(output, "3.0\n");
}

#[test]
fn test_constants() {
    let output = run(
        r#"
        program t;
        const limit = 10; offset = -2;
        begin
            writeln(limit + offset)
        end.
        "#,
    );
    assert_eq!(output, "8\n");
}

#[test]
fn test_string_output() {
    let output = run("program t; begin writeln('hello, world') end.");
    assert_eq!(output, "hello, world\n");
}

#[test]
fn test_write_without_newline() {
    let output = run("program t; begin write('a'); write('b'); writeln end.");
    assert_eq!(output, "ab\n");
}

#[test]
fn test_mixed_write_arguments() {
    let output = run(
        "program t; var x: integer; begin x := 42; writeln('x = ', x) end.",
    );
    assert_eq!(output, "x = 42\n");
}

#[test]
fn test_function_call() {
    let output = run(
        r#"
        program t;
        var result: integer;

        function add(a, b: integer): integer;
        begin
            add := a + b
        end;

        begin
            result := add(3, 4);
            writeln(result)
        end.
        "#,
    );
    assert_eq!(output, "7\n");
}

#[test]
fn test_procedure_with_var_parameter() {
    let output = run(
        r#"
        program t;
        var a, b: integer;

        procedure swap(var x, y: integer);
        var temp: integer;
        begin
            temp := x;
            x := y;
            y := temp
        end;

        begin
            a := 1;
            b := 2;
            swap(a, b);
            writeln(a, ' ', b)
        end.
        "#,
    );
    assert_eq!(output, "2 1\n");
}

#[test]
fn test_value_parameter_does_not_alias() {
    let output = run(
        r#"
        program t;
        var a: integer;

        procedure bump(n: integer);
        begin
            n := n + 1
        end;

        begin
            a := 5;
            bump(a);
            writeln(a)
        end.
        "#,
    );
    assert_eq!(output, "5\n");
}

#[test]
fn test_recursion() {
    let output = run(
        r#"
        program t;

        function fact(n: integer): integer;
        begin
            if n <= 1 then
                fact := 1
            else
                fact := n * fact(n - 1)
        end;

        begin
            writeln(fact(5))
        end.
        "#,
    );
    assert_eq!(output, "120\n");
}

#[test]
fn test_nested_procedures_and_static_links() {
    let output = run(
        r#"
        program t;
        var total: integer;

        procedure outer;
        var step: integer;

            procedure bump;
            begin
                total := total + step
            end;

        begin
            step := 2;
            bump;
            bump
        end;

        begin
            total := 0;
            outer;
            writeln(total)
        end.
        "#,
    );
    assert_eq!(output, "4\n");
}

#[test]
fn test_local_shadows_global() {
    let output = run(
        r#"
        program t;
        var x: integer;

        procedure p;
        var x: integer;
        begin
            x := 10
        end;

        begin
            x := 1;
            p;
            writeln(x)
        end.
        "#,
    );
    assert_eq!(output, "1\n");
}

#[test]
fn test_arrays() {
    let output = run(
        r#"
        program t;
        var squares: array [1..5] of integer;
            i, sum: integer;
        begin
            sum := 0;
            for i := 1 to 5 do
            begin
                squares[i] := i * i;
                sum := sum + squares[i]
            end;
            writeln(sum)
        end.
        "#,
    );
    assert_eq!(output, "55\n");
}

#[test]
fn test_multidimensional_array() {
    let output = run(
        r#"
        program t;
        var grid: array [1..2, 1..3] of integer;
            i, j, sum: integer;
        begin
            sum := 0;
            for i := 1 to 2 do
                for j := 1 to 3 do
                    grid[i, j] := i * j;
            for i := 1 to 2 do
                for j := 1 to 3 do
                    sum := sum + grid[i, j];
            writeln(sum)
        end.
        "#,
    );
    // (1 + 2 + 3) + (2 + 4 + 6)
    assert_eq!(output, "18\n");
}

#[test]
fn test_records() {
    let output = run(
        r#"
        program t;
        type point = record x, y: integer end;
        var p: point;
        begin
            p.x := 3;
            p.y := 4;
            writeln(p.x * p.x + p.y * p.y)
        end.
        "#,
    );
    assert_eq!(output, "25\n");
}

#[test]
fn test_enumeration_and_ord() {
    let output = run(
        r#"
        program t;
        type color = (red, green, blue);
        var c: color;
        begin
            c := blue;
            writeln(ord(c))
        end.
        "#,
    );
    assert_eq!(output, "2\n");
}

#[test]
fn test_subrange_within_bounds() {
    let output = run(
        r#"
        program t;
        var small: 1..10;
        begin
            small := 7;
            writeln(small)
        end.
        "#,
    );
    assert_eq!(output, "7\n");
}

#[test]
fn test_string_comparison() {
    let output = run(
        r#"
        program t;
        begin
            if 'abc' < 'abd' then writeln('less')
        end.
        "#,
    );
    assert_eq!(output, "less\n");
}

#[test]
fn test_standard_functions() {
    let output = run(
        r#"
        program t;
        begin
            writeln(abs(-5));
            writeln(sqr(3));
            writeln(sqrt(16.0));
            writeln(chr(65));
            writeln(ord('a'));
            writeln(succ(4));
            writeln(pred(4));
            writeln(round(2.6));
            writeln(trunc(2.6))
        end.
        "#,
    );
    assert_eq!(output, "5\n9\n4.0\nA\n97\n5\n3\n3\n2\n");
}

#[test]
fn test_odd_in_condition() {
    let output = run(
        r#"
        program t;
        begin
            if odd(3) then writeln('odd');
            if not odd(4) then writeln('even')
        end.
        "#,
    );
    assert_eq!(output, "odd\neven\n");
}

#[test]
fn test_read_integers() {
    let output = run_with_input(
        r#"
        program t;
        var a, b: integer;
        begin
            read(a);
            read(b);
            writeln(a + b)
        end.
        "#,
        "3 4",
    );
    assert_eq!(output, "7\n");
}

#[test]
fn test_readln_skips_rest_of_line() {
    let output = run_with_input(
        r#"
        program t;
        var a, b: integer;
        begin
            readln(a);
            read(b);
            writeln(a, ' ', b)
        end.
        "#,
        "1 999\n2",
    );
    assert_eq!(output, "1 2\n");
}

#[test]
fn test_read_real_and_char() {
    let output = run_with_input(
        r#"
        program t;
        var r: real;
            c: char;
        begin
            read(r);
            read(c);
            read(c);
            writeln(r, ' ', c)
        end.
        "#,
        "2.5xy",
    );
    assert_eq!(output, "2.5 y\n");
}

#[test]
fn test_comments_are_skipped() {
    let output = run(
        "program t; { declaration part } begin { body } writeln(1) { done } end.",
    );
    assert_eq!(output, "1\n");
}

#[test]
fn test_char_variables() {
    let output = run(
        r#"
        program t;
        var c: char;
        begin
            c := 'q';
            writeln(c)
        end.
        "#,
    );
    assert_eq!(output, "q\n");
}

#[test]
fn test_char_array_assignment() {
    let output = run(
        r#"
        program t;
        var name: array [1..5] of char;
        begin
            name := 'fritz';
            writeln(name);
            writeln(name[3])
        end.
        "#,
    );
    assert_eq!(output, "fritz\ni\n");
}
