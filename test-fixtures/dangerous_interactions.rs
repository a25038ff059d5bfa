//! GC-safe and NoGVL-safe functions calling each other.
//!
//! The two safeties are independent: being safe for one says nothing about
//! the other.

#[gc_safe]
#[nogvl_safe]
fn complicated(_v1: i32) {}

#[nogvl_safe]
fn f1() -> i32 { //~ decl gc-safety
    1
}

#[gc_safe]
fn f2() -> i32 { //~ decl nogvl-safety
    1
}

fn plain() {} //~ decl gc-safety, decl nogvl-safety, decl nogvl-safety

#[gc_safe]
fn this_runs_under_gc() {
    f1(); //~ gc-safety
    complicated(f2());
}

#[nogvl_safe]
fn this_runs_without_gvl() {
    f1();
    complicated(f2()); //~ nogvl-safety
}

#[gc_safe]
#[nogvl_safe]
fn dual_context_reports_both() {
    plain(); //~ gc-safety, nogvl-safety
}

#[gc_safe]
fn this_runs_under_gc_good() {
    complicated(f2());
}

#[nogvl_safe]
fn this_runs_without_gvl_good() {
    f1();
    complicated(f1());
}

fn unannotated_callers_are_never_checked() {
    plain();
    f1();
    f2();
}

#[gc_safe]
fn calls_through_a_pointer_are_unsafe(callback: fn()) {
    callback(); //~ gc-safety
}

#[nogvl_safe]
fn nested_unannotated_fn_still_runs_in_context() {
    fn helper() { //~ decl nogvl-safety
        plain(); //~ nogvl-safety
    }
    helper(); //~ nogvl-safety
}
