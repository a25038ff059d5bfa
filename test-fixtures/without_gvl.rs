//! NoGVL-safe contexts, GVL guards, and the transition into running
//! without the GVL, in the shape of a native extension's sampling code.

extern "C" {
    fn ruby_check() -> bool; //~ decl nogvl-safety
    fn ruby_xmalloc(size: usize) -> *mut u8;
    //~^ decl nogvl-safety, decl nogvl-safety, decl nogvl-safety, decl nogvl-safety
    //~^^ decl nogvl-transition
    fn rb_thread_call_with_gvl(func: extern "C" fn());
    fn rb_thread_call_without_gvl(func: extern "C" fn());
    fn RSTRING_PTR(value: usize) -> *const u8; //~ decl nogvl-safety

    #[gvl_guard]
    fn has_gvl() -> bool;
}

extern "C" fn acquire() {}

#[nogvl_safe]
fn f1_without_gvl() -> i32 {
    if has_gvl() {
        ruby_xmalloc(16);
        return 0;
    }
    ruby_xmalloc(16); //~ nogvl-safety
    1
}

#[nogvl_safe]
fn f2_without_gvl() -> i32 {
    if has_gvl() {
        1
    } else {
        rb_thread_call_with_gvl(acquire);
        0
    }
}

#[nogvl_safe]
fn f3_without_gvl() -> i32 {
    #[gvl_guard]
    let gvl = true;
    if gvl {
        ruby_xmalloc(16);
        0
    } else {
        1
    }
}

#[nogvl_safe]
fn f4_without_gvl() -> i32 {
    if has_gvl() {
        ruby_xmalloc(16);
        1
    } else {
        ruby_xmalloc(16); //~ nogvl-safety
        0
    }
}

#[nogvl_safe]
fn f5_without_gvl() -> i32 {
    ruby_xmalloc(16); //~ nogvl-safety
    0
}

fn f6_without_gvl() -> i32 { //~ decl nogvl-safety
    ruby_xmalloc(16);
    0
}

#[nogvl_safe]
fn f7_without_gvl() -> i32 {
    if ruby_check() { //~ nogvl-safety
        ruby_xmalloc(16); //~ nogvl-safety
    }
    0
}

struct Buf;

impl Buf {
    #[nogvl_safe]
    fn push(&mut self, _byte: u8) {}
}

#[nogvl_safe]
fn write(_fd: i32) {}

#[nogvl_safe]
fn f8_without_gvl(value: usize, out: &mut Vec<u8>) {
    RSTRING_PTR(value); //~ nogvl-safety
    libc::write(1); //~ nogvl-safety
    write(1);
    out.push(1); //~ nogvl-safety
}

#[nogvl_safe]
extern "C" fn this_runs_without_gvl() {
    f1_without_gvl();
    f2_without_gvl();
    f3_without_gvl();
    f4_without_gvl();
    f5_without_gvl();
    f6_without_gvl(); //~ nogvl-safety
    f7_without_gvl();
}

fn main() {
    unsafe {
        rb_thread_call_without_gvl(this_runs_without_gvl);
        rb_thread_call_without_gvl(ruby_xmalloc); //~ nogvl-transition
    }
}
