#![cfg(target_os = "android")]

use crate::jni_bool;
use crate::logging;
use crate::native::{NativeCrypto, NativeDns, NativeTunEngine};
use jni::objects::{GlobalRef, JObject, JString, JValue};
use jni::sys::{jboolean, jint, JNI_ERR, JNI_FALSE, JNI_TRUE, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM, NativeMethod};
use once_cell::sync::OnceCell;
use std::ffi::c_void;
use std::os::raw::c_int;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use xtun_core::{
    Error, LogLevel, ProtectCapability, RawFd, Result, SessionConfig, SessionController,
    SocketProtector, SubsystemInitializer,
};

const CLASS_PATH: &str = "io/github/xTun/xTun";
const INIT_SIG: &str = "(Lio/github/xTun/service/XtunVpnService;IIZZLjava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Z";

type Session = SessionController<NativeTunEngine>;

/// The process-wide session, created in JNI_OnLoad
static SESSION: OnceCell<Session> = OnceCell::new();

fn session() -> &'static Session {
    SESSION.get_or_init(|| {
        SessionController::new(
            NativeTunEngine,
            SubsystemInitializer::new(Arc::new(NativeCrypto), Arc::new(NativeDns)),
            Arc::new(SocketProtector::new()),
        )
    })
}

/// Calls `XtunVpnService.protectSocket(int)` from whichever thread asks
struct JniProtector {
    vm: JavaVM,
    service: GlobalRef,
}

impl ProtectCapability for JniProtector {
    fn protect(&self, fd: RawFd) -> Result<bool> {
        // Engine threads stay attached until they exit
        let mut env = self.vm.attach_current_thread_permanently().map_err(|e| {
            Error::capability_unavailable(format!("Failed to attach thread to JVM: {:?}", e), fd)
        })?;

        let result = env
            .call_method(
                self.service.as_obj(),
                "protectSocket",
                "(I)Z",
                &[JValue::Int(fd)],
            )
            .and_then(|ret| ret.z());

        match result {
            Ok(protected) => Ok(protected),
            Err(e) => {
                if env.exception_check().unwrap_or(false) {
                    let _ = env.exception_describe();
                    let _ = env.exception_clear();
                }
                Err(Error::capability_unavailable(
                    format!("Failed to call protectSocket(): {:?}", e),
                    fd,
                ))
            }
        }
    }
}

/// Exported for the engine, which protects its upstream sockets through it.
///
/// Returns 1 only when the host protected `fd`; any failure is 0 so the
/// engine drops the socket instead of looping it through the tunnel.
#[no_mangle]
pub extern "C" fn protectSocket(fd: c_int) -> c_int {
    c_int::from(session().protector().protect_or_refuse(fd))
}

fn java_string(env: &mut JNIEnv, value: &JString, name: &str) -> Result<String> {
    env.get_string(value)
        .map(String::from)
        .map_err(|e| Error::config(format!("Invalid {} argument: {:?}", name, e)))
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    env: &mut JNIEnv,
    fd: jint,
    mtu: jint,
    is_global_proxy: jboolean,
    verbose: jboolean,
    server: &JString,
    password: &JString,
    dns: &JString,
    domain_path: &JString,
) -> Result<SessionConfig> {
    Ok(SessionConfig {
        tun_fd: fd,
        mtu,
        global_proxy: jni_bool(is_global_proxy),
        verbose: jni_bool(verbose),
        server: java_string(env, server, "server")?,
        passphrase: java_string(env, password, "password")?,
        dns: java_string(env, dns, "dns")?,
        domain_table: java_string(env, domain_path, "domain path")?,
    })
}

fn protector_for(env: &mut JNIEnv, service: &JObject) -> Result<JniProtector> {
    let vm = env
        .get_java_vm()
        .map_err(|e| Error::config(format!("Failed to get JavaVM: {:?}", e)))?;
    let service = env
        .new_global_ref(service)
        .map_err(|e| Error::config(format!("Failed to create global reference: {:?}", e)))?;
    Ok(JniProtector { vm, service })
}

#[allow(clippy::too_many_arguments)]
extern "system" fn native_init(
    mut env: JNIEnv,
    _thiz: JObject,
    service: JObject,
    fd: jint,
    mtu: jint,
    is_global_proxy: jboolean,
    verbose: jboolean,
    server: JString,
    password: JString,
    dns: JString,
    domain_path: JString,
) -> jboolean {
    let result = protector_for(&mut env, &service).and_then(|protector| {
        let config = build_config(
            &mut env,
            fd,
            mtu,
            is_global_proxy,
            verbose,
            &server,
            &password,
            &dns,
            &domain_path,
        );
        // The capability is registered even when the parameters are unusable
        match config {
            Ok(config) => {
                logging::set_level(config.log_level());
                session().init(Arc::new(protector), config)
            }
            Err(e) => {
                session().protector().register(Arc::new(protector));
                Err(e)
            }
        }
    });

    match result {
        Ok(()) => JNI_TRUE,
        Err(e) => {
            xtun_core::logging::log_error(&e, Some("Session init failed"));
            JNI_FALSE
        }
    }
}

extern "system" fn native_start(_env: JNIEnv, _thiz: JObject) {
    if let Err(e) = session().start() {
        xtun_core::logging::log_error(&e, Some("Session start failed"));
    }
}

extern "system" fn native_stop(_env: JNIEnv, _thiz: JObject) {
    if let Err(e) = session().stop() {
        xtun_core::logging::log_error(&e, Some("Session stop failed"));
    }
}

fn register_natives(env: &mut JNIEnv) -> jni::errors::Result<()> {
    info!("Registering {} natives", CLASS_PATH);

    let class = match env.find_class(CLASS_PATH) {
        Ok(class) => class,
        Err(e) => {
            error!("Native registration unable to find class {}", CLASS_PATH);
            let _ = env.exception_clear();
            return Err(e);
        }
    };

    let methods = [
        NativeMethod {
            name: "init".into(),
            sig: INIT_SIG.into(),
            fn_ptr: native_init as *mut c_void,
        },
        NativeMethod {
            name: "start".into(),
            sig: "()V".into(),
            fn_ptr: native_start as *mut c_void,
        },
        NativeMethod {
            name: "stop".into(),
            sig: "()V".into(),
            fn_ptr: native_stop as *mut c_void,
        },
    ];

    let result = env.register_native_methods(&class, &methods);
    if result.is_err() {
        error!("RegisterNatives failed: {}", CLASS_PATH);
    }
    let _ = env.delete_local_ref(class);
    result
}

#[no_mangle]
pub extern "system" fn JNI_OnLoad(vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
    logging::init_logging(LogLevel::Info);

    let vm = match unsafe { JavaVM::from_raw(vm) } {
        Ok(vm) => vm,
        Err(e) => {
            error!("Invalid JavaVM pointer: {:?}", e);
            return JNI_ERR;
        }
    };
    let mut env = match vm.get_env() {
        Ok(env) => env,
        Err(e) => {
            error!("Failed to get JNIEnv: {:?}", e);
            return JNI_ERR;
        }
    };

    // Class lookup failures are logged; the library stays loadable
    let _ = register_natives(&mut env);
    session();

    debug!("JNI_OnLoad complete");
    JNI_VERSION_1_6
}

#[no_mangle]
pub extern "system" fn JNI_OnUnload(_vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) {
    match SESSION.get() {
        Some(session) => {
            session.shutdown();
            info!("Session shut down on unload");
        }
        None => warn!("JNI_OnUnload without a session"),
    }
}
