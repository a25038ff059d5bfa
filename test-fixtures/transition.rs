//! Callbacks handed to `rb_thread_call_without_gvl` run without the GVL,
//! whatever context the transition call itself sits in.

use std::ffi::c_void;

type Callback = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type Unblock = unsafe extern "C" fn(*mut c_void);

extern "C" {
    fn rb_thread_call_without_gvl(
        func: Option<Callback>,
        data1: *mut c_void,
        ubf: Option<Unblock>,
        data2: *mut c_void,
    ) -> *mut c_void;
}

#[nogvl_safe]
unsafe extern "C" fn sample_without_gvl(data: *mut c_void) -> *mut c_void {
    data
}

unsafe extern "C" fn unannotated_sampler(data: *mut c_void) -> *mut c_void { //~ decl nogvl-transition
    data
}

#[gc_safe]
unsafe extern "C" fn gc_only_sampler(data: *mut c_void) -> *mut c_void { //~ decl nogvl-transition
    data
}

fn start_sampling(data: *mut c_void) {
    unsafe {
        rb_thread_call_without_gvl(Some(sample_without_gvl), data, None, data);
        rb_thread_call_without_gvl(Some(unannotated_sampler), data, None, data); //~ nogvl-transition
        rb_thread_call_without_gvl(Some(unannotated_sampler), data, None, data); //~ nogvl-transition
        rb_thread_call_without_gvl(Some(gc_only_sampler), data, None, data); //~ nogvl-transition
    }
}

fn whitelisted_callbacks(data: *mut c_void) {
    unsafe {
        rb_thread_call_without_gvl(Some(pthread_sampler), data, None, data);
        rb_thread_call_without_gvl(Some(ddog_prof_sample), data, None, data);
    }
}

fn undeclared_callback(data: *mut c_void) {
    unsafe {
        rb_thread_call_without_gvl(Some(native::sampler), data, None, data); //~ nogvl-transition
    }
}

fn wrapped_callback(data: *mut c_void) {
    unsafe {
        rb_thread_call_without_gvl(
            Some((unannotated_sampler) as Callback), //~ nogvl-transition
            data,
            None,
            data,
        );
    }
}
