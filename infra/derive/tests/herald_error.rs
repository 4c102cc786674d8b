#[test]
fn herald_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/herald_error_pass.rs");
    t.pass("tests/ui/herald_main_pass.rs");
    t.compile_fail("tests/ui/herald_error_no_context.rs");
    t.compile_fail("tests/ui/herald_error_bad_context_type.rs");
}
