//! Lowering passes that retarget scheduled loop nests at the OpenGL runtime
//!
//! Two rewrites run before code emission:
//!
//! 1. [`zero_gpu_loop_mins`] canonicalizes every GPU loop to iterate over
//!    `[0, extent)`, adding the old minimum back at each use of the loop
//!    variable.
//! 2. [`inject_texture_intrinsics`] rewrites buffer reads and writes inside
//!    GPU block loops into [`TEXTURE_LOAD`] / [`TEXTURE_STORE`] intrinsic
//!    calls whose coordinates follow the device's sampling convention:
//!    spatial coordinates are normalized to sample centers, channel
//!    coordinates stay integral.
//!
//! [`inject_opengl_intrinsics`] runs both in order.  The intrinsic names and
//! the coordinate convention are the only contract shared with the device
//! runtime; everything else about the IR stays backend-neutral.

use std::collections::HashSet;

use log::debug;

use crate::ir::{
    substitute, walk_expr, walk_stmt, CallKind, Expr, ForKind, Mutator, ScalarType, Stmt,
};
use crate::Error;

/// Intrinsic that samples a texture at normalized spatial coordinates
pub const TEXTURE_LOAD: &str = "glsl_texture_load";

/// Intrinsic that writes one value at an integer pixel coordinate
pub const TEXTURE_STORE: &str = "glsl_texture_store";

/// Checks whether a loop variable names a GPU block index
pub fn is_gpu_block_var(name: &str) -> bool {
    name.contains(".__block_id_")
}

/// Checks whether a loop variable names a GPU thread index
pub fn is_gpu_thread_var(name: &str) -> bool {
    name.contains(".__thread_id_")
}

/// Checks whether a loop variable names any GPU index
pub fn is_gpu_var(name: &str) -> bool {
    is_gpu_block_var(name) || is_gpu_thread_var(name)
}

////////////////////////////////////////////////////////////////////////////////

struct ZeroLoopMins;

impl Mutator for ZeroLoopMins {
    fn mutate_stmt(&mut self, stmt: &Stmt) -> Result<Stmt, Error> {
        let stmt = walk_stmt(self, stmt)?;
        if let Stmt::For {
            name,
            kind,
            min,
            extent,
            body,
        } = &stmt
        {
            if is_gpu_var(name) && !min.is_zero() {
                debug!("normalizing GPU loop '{name}' to start at zero");
                let adjusted = Expr::var(name.clone()) + min.clone();
                let body = substitute(name, &adjusted, body)?;
                return Ok(Stmt::For {
                    name: name.clone(),
                    kind: *kind,
                    min: Expr::int(0),
                    extent: extent.clone(),
                    body: Box::new(body),
                });
            }
        }
        Ok(stmt)
    }
}

/// Rewrites every GPU loop to start at zero
///
/// A loop `for (v, min, extent)` over a block or thread index becomes
/// `for (v, 0, extent)` with `v + min` substituted for `v` throughout the
/// body, so downstream passes always see a canonical iteration domain.
pub fn zero_gpu_loop_mins(stmt: &Stmt) -> Result<Stmt, Error> {
    ZeroLoopMins.mutate_stmt(stmt)
}

////////////////////////////////////////////////////////////////////////////////

struct InjectTextureIntrinsics {
    inside_kernel_loop: bool,
    constrained: HashSet<String>,
}

impl InjectTextureIntrinsics {
    fn new() -> Self {
        Self {
            inside_kernel_loop: false,
            constrained: HashSet::new(),
        }
    }

    /// Returns `base` or its `.constrained` variant when one is in scope
    fn resolve(&self, base: String) -> String {
        let constrained = format!("{base}.constrained");
        if self.constrained.contains(&constrained) {
            constrained
        } else {
            base
        }
    }

    /// Normalizes a read coordinate for dimension `dim`
    ///
    /// The two spatial dimensions sample at pixel centers, so the coordinate
    /// maps to `(float(c - min) + 0.5) / extent`; channel dimensions stay as
    /// the zero-based integer `c - min`.
    fn lower_coordinate(&self, name: &str, dim: usize, coord: &Expr) -> Expr {
        let min = Expr::var(self.resolve(format!("{name}.min.{dim}")));
        if dim < 2 {
            let extent = Expr::var(self.resolve(format!("{name}.extent.{dim}")));
            (Expr::cast(ScalarType::Float32, coord.clone() - min) + Expr::float(0.5))
                / Expr::cast(ScalarType::Float32, extent)
        } else {
            coord.clone() - min
        }
    }
}

impl Mutator for InjectTextureIntrinsics {
    fn mutate_stmt(&mut self, stmt: &Stmt) -> Result<Stmt, Error> {
        match stmt {
            Stmt::Store {
                name,
                coords,
                values,
            } if self.inside_kernel_loop => {
                if values.len() != 1 {
                    return Err(Error::MultiValueStore(values.len()));
                }
                if coords.len() != 3 {
                    return Err(Error::BadStoreArity(coords.len()));
                }
                let mut args = Vec::with_capacity(6);
                args.push(Expr::str(name.clone()));
                args.push(Expr::var(format!("{name}.buffer")));
                args.extend(coords.iter().cloned());
                args.push(self.mutate_expr(&values[0])?);
                Ok(Stmt::Eval(Expr::intrinsic(TEXTURE_STORE, args)))
            }
            Stmt::Let { name, .. } => {
                let constrained = name.ends_with(".constrained");
                if constrained {
                    self.constrained.insert(name.clone());
                }
                let out = walk_stmt(self, stmt);
                if constrained {
                    self.constrained.remove(name);
                }
                out
            }
            Stmt::For { name, kind, .. } => {
                let was_kernel_loop = self.inside_kernel_loop;
                if *kind == ForKind::Parallel && is_gpu_block_var(name) {
                    self.inside_kernel_loop = true;
                }
                let out = walk_stmt(self, stmt);
                self.inside_kernel_loop = was_kernel_loop;
                out
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn mutate_expr(&mut self, expr: &Expr) -> Result<Expr, Error> {
        match expr {
            Expr::Call {
                kind: CallKind::Buffer,
                name,
                args,
            } if self.inside_kernel_loop => {
                let mut out = Vec::with_capacity(args.len() + 2);
                out.push(Expr::str(name.clone()));
                out.push(Expr::var(format!("{name}.buffer")));
                for (dim, coord) in args.iter().enumerate() {
                    out.push(self.lower_coordinate(name, dim, coord));
                }
                Ok(Expr::intrinsic(TEXTURE_LOAD, out))
            }
            _ => walk_expr(self, expr),
        }
    }
}

/// Rewrites buffer accesses inside GPU block loops into texture intrinsics
///
/// Reads become [`TEXTURE_LOAD`] calls taking the buffer name, a handle
/// variable named `<buffer>.buffer`, and the lowered coordinates; writes
/// become [`TEXTURE_STORE`] expression-statements.  Stores must supply
/// exactly three coordinates and a single value.  Code outside GPU block
/// loops is left untouched.
pub fn inject_texture_intrinsics(stmt: &Stmt) -> Result<Stmt, Error> {
    InjectTextureIntrinsics::new().mutate_stmt(stmt)
}

/// Runs the full OpenGL lowering: zero-min normalization, then intrinsic
/// injection
pub fn inject_opengl_intrinsics(stmt: &Stmt) -> Result<Stmt, Error> {
    inject_texture_intrinsics(&zero_gpu_loop_mins(stmt)?)
}
