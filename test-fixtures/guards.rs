//! Which calls a GVL guard exempts from the NoGVL rule.
//!
//! Only the "then" branch of the nearest `if` whose condition is a guard
//! reference or a guard call is exempt.

extern "C" {
    #[gvl_guard]
    fn has_gvl() -> bool; //~ decl gc-safety
    fn ruby_native_thread_p() -> bool; //~ decl nogvl-safety
    fn rb_raise();
    //~^ decl nogvl-safety, decl nogvl-safety, decl nogvl-safety
    //~^^ decl nogvl-safety, decl nogvl-safety, decl nogvl-safety, decl gc-safety
}

struct Vm;

impl Vm {
    #[gvl_guard]
    fn holds_gvl(&self) -> bool {
        true
    }

    #[nogvl_safe]
    fn sample(&self) {
        if self.holds_gvl() {
            rb_raise();
        }
    }
}

#[nogvl_safe]
fn negated_guard_exempts_nothing() {
    if !has_gvl() {
        rb_raise(); //~ nogvl-safety
    } else {
        rb_raise(); //~ nogvl-safety
    }
}

#[nogvl_safe]
fn inner_unguarded_condition_decides() {
    if has_gvl() {
        if ruby_native_thread_p() {
            rb_raise(); //~ nogvl-safety
        }
    }
}

#[nogvl_safe]
fn plain_inner_condition_is_transparent(count: i32) {
    if has_gvl() {
        if count > 0 {
            rb_raise();
        }
    }
}

#[nogvl_safe]
fn closure_in_guarded_branch() {
    if has_gvl() {
        let raise = || rb_raise();
        raise();
    }
}

#[nogvl_safe]
fn nested_fn_in_guarded_branch() {
    if has_gvl() {
        fn deferred() {
            rb_raise(); //~ nogvl-safety
        }
        deferred();
    }
}

#[nogvl_safe]
fn guard_parameter(#[gvl_guard] holding: bool) {
    if holding {
        rb_raise();
    }
}

#[nogvl_safe]
fn guard_method_on_unknown_receiver(vm: &Vm) {
    if vm.holds_gvl() { //~ nogvl-safety
        rb_raise(); //~ nogvl-safety
    }
}

#[nogvl_safe]
fn while_is_not_a_guard() {
    while has_gvl() {
        rb_raise(); //~ nogvl-safety
    }
}

#[nogvl_safe]
fn else_if_guard() {
    if ruby_native_thread_p() { //~ nogvl-safety
        rb_raise(); //~ nogvl-safety
    } else if has_gvl() {
        rb_raise();
    }
}

#[gc_safe]
fn guard_does_not_exempt_gc() {
    if has_gvl() { //~ gc-safety
        rb_raise(); //~ gc-safety
    }
}
