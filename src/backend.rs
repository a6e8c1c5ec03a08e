use crate::codegen::{clif_type, KernelCodegen};
use crate::definition::ElementwiseDef;
use crate::dtype::DType;
use crate::error::UfuncError;
use crate::objmode::ObjectModeKernel;
use crate::registry::{symbol_name, HostFunctions};
use crate::rt_types::{Fn1, Fn2, Fn3, KernelFn};
use crate::scalar::Scalar;
use crate::specialization::{CodeLibrary, EntryPoint, Environment};
use crate::typeck::TypeMap;
use cranelift::codegen::isa::OwnedTargetIsa;
use cranelift::codegen::settings;
use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use cranelift_native as native;
use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Per-function compilation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetOptions {
    /// Fail instead of falling back to object mode.
    pub nopython: bool,
    /// Always compile to the boxed evaluator.
    pub forceobj: bool,
}

/// Cranelift `opt_level` setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// What a backend hands back for one signature.
pub struct CompileResult {
    pub entry: EntryPoint,
    pub library: Arc<CodeLibrary>,
    pub environment: Arc<Environment>,
    pub return_type: DType,
    pub objectmode: bool,
}

/// Compiles an elementwise definition for concrete input types.
///
/// `ret` is the requested return type; `None` means infer it.
pub trait CompilerBackend: Send {
    fn compile(
        &mut self,
        def: &Arc<ElementwiseDef>,
        args: &[DType],
        ret: Option<DType>,
        options: &TargetOptions,
    ) -> Result<CompileResult, UfuncError>;
}

/// Compiles definitions to native code with Cranelift, one `JITModule` per
/// specialization.
pub struct CraneliftBackend {
    isa: OwnedTargetIsa,
    hosts: HostFunctions,
    opt_level: OptLevel,
}

impl CraneliftBackend {
    pub fn new() -> Result<Self, UfuncError> {
        Self::with_opt_level(OptLevel::default())
    }

    pub fn with_opt_level(opt_level: OptLevel) -> Result<Self, UfuncError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", opt_level.as_setting())
            .map_err(|e| UfuncError::Internal(format!("settings error: {}", e)))?;
        let isa_builder = native::builder().map_err(|e| UfuncError::Internal(e.to_string()))?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| UfuncError::Internal(e.to_string()))?;
        Ok(Self {
            isa,
            hosts: HostFunctions::new(),
            opt_level,
        })
    }

    pub fn with_hosts(mut self, hosts: HostFunctions) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    pub fn hosts(&self) -> &HostFunctions {
        &self.hosts
    }

    pub fn register_unary(&mut self, name: &str, f: Fn1) -> Result<(), UfuncError> {
        self.hosts.register_unary(name, f)
    }

    pub fn register_binary(&mut self, name: &str, f: Fn2) -> Result<(), UfuncError> {
        self.hosts.register_binary(name, f)
    }

    pub fn register_ternary(&mut self, name: &str, f: Fn3) -> Result<(), UfuncError> {
        self.hosts.register_ternary(name, f)
    }

    pub fn register_dynamic<F>(&mut self, name: &str, arity: u8, ret: DType, f: F) -> Result<(), UfuncError>
    where
        F: Fn(&[Scalar]) -> Result<Scalar, UfuncError> + Send + Sync + 'static,
    {
        self.hosts.register_dynamic(name, arity, ret, f)
    }

    fn build_native(
        &self,
        def: &ElementwiseDef,
        types: &TypeMap,
        args: &[DType],
        ret: DType,
        func_name: &str,
    ) -> Result<(KernelFn, JITModule), UfuncError> {
        let mut jb = JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        for ((name, arity), f) in self.hosts.native() {
            jb.symbol(symbol_name(name, *arity), f.addr());
        }
        let mut module = JITModule::new(jb);

        // (args: *const u64, out: *mut u64) -> ()
        let ptr_ty = module.target_config().pointer_type();
        let mut sig = module.make_signature();
        sig.params.push(AbiParam::new(ptr_ty));
        sig.params.push(AbiParam::new(ptr_ty));
        let func_id = module
            .declare_function(func_name, Linkage::Local, &sig)
            .map_err(|e| UfuncError::Internal(e.to_string()))?;

        let mut ctx = module.make_context();
        ctx.func.signature = sig;
        let mut fb_ctx = FunctionBuilderContext::new();
        {
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut fb_ctx);
            let block = builder.create_block();
            builder.append_block_params_for_function_params(block);
            builder.switch_to_block(block);
            builder.seal_block(block);

            let args_ptr = builder.block_params(block)[0];
            let out_ptr = builder.block_params(block)[1];

            let mut mf = MemFlags::new();
            mf.set_aligned();
            mf.set_notrap();

            let mut params = Vec::with_capacity(args.len());
            for (idx, t) in args.iter().enumerate() {
                let v = builder.ins().load(clif_type(*t), mf, args_ptr, (idx as i32) * 8);
                params.push((v, *t));
            }

            let body = def.body()?;
            let mut cg = KernelCodegen {
                module: &mut module,
                builder: &mut builder,
                def,
                types,
                hosts: &self.hosts,
                params,
            };
            let val = cg.expr_as(body, ret)?;
            builder.ins().store(mf, val, out_ptr, 0);
            builder.ins().return_(&[]);
            builder.finalize();
        }
        debug!("JIT code\n{}", ctx.func.display());

        module
            .define_function(func_id, &mut ctx)
            .map_err(|e| UfuncError::Lowering(e.to_string()))?;
        module.clear_context(&mut ctx);
        module
            .finalize_definitions()
            .map_err(|e| UfuncError::Internal(e.to_string()))?;

        let code = module.get_finalized_function(func_id);
        let entry: KernelFn = unsafe { std::mem::transmute::<*const u8, KernelFn>(code) };
        Ok((entry, module))
    }
}

impl CompilerBackend for CraneliftBackend {
    fn compile(
        &mut self,
        def: &Arc<ElementwiseDef>,
        args: &[DType],
        ret: Option<DType>,
        options: &TargetOptions,
    ) -> Result<CompileResult, UfuncError> {
        if options.nopython && options.forceobj {
            return Err(UfuncError::Lowering(
                "nopython and forceobj cannot both be set".into(),
            ));
        }
        let types = TypeMap::compute(def, args, &self.hosts)?;
        let return_type = match ret {
            Some(t) => t,
            None => types.dtype(def.body()?)?,
        };
        let func_name = format!("{}_{}", def.name(), Uuid::new_v4().simple());
        let environment = Arc::new(Environment::new(def.host_calls()));

        let objectmode = options.forceobj || types.uses_dynamic;
        if objectmode {
            if options.nopython {
                return Err(UfuncError::Lowering(format!(
                    "{} calls a dynamic host function and cannot be compiled in nopython mode",
                    def.name()
                )));
            }
            if !options.forceobj {
                warn!(
                    "falling back to object mode for {}({})",
                    def.name(),
                    args.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
                );
            }
            let kernel = ObjectModeKernel::new(
                def.clone(),
                types,
                self.hosts.clone(),
                args.to_vec(),
                return_type,
            );
            return Ok(CompileResult {
                entry: EntryPoint::boxed(kernel),
                library: Arc::new(CodeLibrary::empty(func_name)),
                environment,
                return_type,
                objectmode: true,
            });
        }

        let (entry, module) = self.build_native(def, &types, args, return_type, &func_name)?;
        Ok(CompileResult {
            entry: EntryPoint::Native(entry),
            library: Arc::new(CodeLibrary::new(module, func_name)),
            environment,
            return_type,
            objectmode: false,
        })
    }
}
