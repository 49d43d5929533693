//! End-to-end pipeline tests: source text through the lexer, parser,
//! emitter, and VM, asserting on observable memory and output.

use actc_drv::compile;
use actc_util::{CompileError, Handler};
use actc_vm::Vm;

fn compile_ok(source: &str) -> actc_emit::ProgramImage {
    let mut handler = Handler::new();
    compile(source, "<test>", &mut handler).expect("compile failed")
}

fn run(source: &str) -> Vm<Vec<u8>> {
    let image = compile_ok(source);
    let mut vm = Vm::load(&image, Vec::new()).expect("load failed");
    vm.run().expect("run failed");
    vm
}

fn run_output(source: &str) -> String {
    let image = compile_ok(source);
    let mut out = Vec::new();
    actc_drv::run_image(&image, &mut out).expect("run failed");
    String::from_utf8(out).unwrap()
}

// =============================================================================
// IMAGE LAYOUT
// =============================================================================

#[test]
fn test_global_scalar_image_prefix() {
    let image = compile_ok("BYTE x  CHAR y=['a]  INT z=[$1234]  CARD a");
    assert_eq!(&image.code[..6], &[0x00, 0x61, 0x34, 0x12, 0x00, 0x00]);
}

#[test]
fn test_string_global_is_length_prefixed() {
    let image = compile_ok("CHAR ARRAY st = \"Hello\"");
    assert_eq!(image.code, vec![0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]);
}

// =============================================================================
// EXECUTION SCENARIOS
// =============================================================================

#[test]
fn test_arithmetic_and_promotion() {
    // b at 0x2000, i at 0x2001; running main leaves i = 1005 stored
    // little-endian.
    let vm = run("BYTE b=[5]  INT i  PROC main() i = b + 1000 RETURN");
    assert_eq!(vm.read_byte(0x2001), 0xED);
    assert_eq!(vm.read_byte(0x2002), 0x03);
}

#[test]
fn test_procedure_call_prints() {
    let output = run_output("PROC p() DEVPRINT(1) RETURN  PROC main() p() RETURN");
    assert_eq!(output, "1\n");
}

#[test]
fn test_while_with_exit() {
    let vm = run(
        "INT i
         PROC main()
           i = 0
           WHILE i < 10
           DO
             i = i + 1
             IF i = 5 THEN EXIT FI
           OD
         RETURN",
    );
    assert_eq!(vm.read_card(0x2000), 5);
}

#[test]
fn test_record_field_access() {
    let vm = run("TYPE Pt = [BYTE x BYTE y]  Pt p  PROC main() p.x = 3 p.y = 4 RETURN");
    assert_eq!(vm.read_byte(0x2000), 3);
    assert_eq!(vm.read_byte(0x2001), 4);
}

#[test]
fn test_fibonacci_with_globals() {
    let vm = run(
        "INT a INT b INT t INT n
         PROC main()
           a = 0 b = 1
           FOR n = 1 TO 10
           DO
             t = a + b
             a = b
             b = t
           OD
         RETURN",
    );
    // After ten steps a holds fib(10).
    assert_eq!(vm.read_card(0x2000), 55);
}

#[test]
fn test_function_call_in_expression() {
    // Calls may appear in expressions, just not inside argument lists.
    let output = run_output(
        "INT r
         INT FUNC double(INT x) RETURN (x * 2)
         PROC main()
           r = double(20) + 2
           DEVPRINT(r)
         RETURN",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn test_modules_share_globals() {
    let vm = run(
        "MODULE
         BYTE shared
         PROC set() shared = 9 RETURN
         MODULE
         PROC main() set() RETURN",
    );
    assert_eq!(vm.read_byte(0x2000), 9);
}

// =============================================================================
// DIAGNOSTICS
// =============================================================================

#[test]
fn test_warning_does_not_fail_the_build() {
    let mut handler = Handler::new();
    let image = compile(
        "PROC p(BYTE a, BYTE b) RETURN  PROC main() p(1) RETURN",
        "<test>",
        &mut handler,
    )
    .expect("warnings must not fail compilation");
    assert_eq!(handler.warning_count(), 1);
    assert!(image.entry.is_some());
}

#[test]
fn test_error_kinds_from_pipeline() {
    let mut handler = Handler::new();
    let lex = compile("\"unterminated", "<t>", &mut handler).unwrap_err();
    assert!(matches!(lex, CompileError::Lex { .. }));

    let syntax = compile("PROC main() IF 1 THEN RETURN", "<t>", &mut handler).unwrap_err();
    assert!(matches!(syntax, CompileError::Syntax { .. }));

    let ident = compile("PROC main() missing = 1 RETURN", "<t>", &mut handler).unwrap_err();
    assert!(matches!(ident, CompileError::Identifier { .. }));

    let ty = compile(
        "BYTE b PROC main() b = 1 < 2 RETURN",
        "<t>",
        &mut handler,
    )
    .unwrap_err();
    assert!(matches!(ty, CompileError::Type { .. }));
}

#[test]
fn test_deterministic_emission() {
    let source = "BYTE b=[5] INT i PROC main() i = b + 1000 RETURN";
    let a = compile_ok(source);
    let b = compile_ok(source);
    assert_eq!(a.code, b.code);
    assert_eq!(a.entry, b.entry);
}
