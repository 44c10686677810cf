//! Symbolic right-hand sides of the update relations.
//!
//! Expressions reference fields, parameters and sparse series through the
//! handles a [`Workspace`](crate::field::Workspace) hands out; they hold no
//! data themselves.

use crate::field::{FieldId, ParamId};
use crate::grid::{Axis, SpacingMap, Symbol};
use std::collections::BTreeSet;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Which stored time level a field read refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeLevel {
    Now,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub field: FieldId,
    pub time: TimeLevel,
}

impl FieldId {
    pub fn now(self) -> FieldRef {
        FieldRef {
            field: self,
            time: TimeLevel::Now,
        }
    }

    pub fn forward(self) -> FieldRef {
        FieldRef {
            field: self,
            time: TimeLevel::Forward,
        }
    }
}

impl FieldRef {
    pub fn expr(self) -> Expr {
        Expr::Field(self)
    }

    /// First derivative along `axis`, staggered where the field allows it.
    pub fn d(self, axis: Axis) -> Expr {
        Expr::Derivative(self, axis)
    }

    pub fn dx(self) -> Expr {
        self.d(Axis::X)
    }

    pub fn dy(self) -> Expr {
        self.d(Axis::Y)
    }

    pub fn dz(self) -> Expr {
        self.d(Axis::Z)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Symbol(Symbol),
    Param(ParamId),
    Field(FieldRef),
    Derivative(FieldRef, Axis),
    Add(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

impl Expr {
    pub fn dt() -> Expr {
        Expr::Symbol(Symbol::Dt)
    }

    /// Replace every symbol bound in `subs` by its value.
    pub fn substitute(&self, subs: &SpacingMap) -> Expr {
        match self {
            Expr::Symbol(s) => match subs.get(s) {
                Some(&v) => Expr::Const(v),
                None => self.clone(),
            },
            Expr::Add(a, b) => Expr::Add(Box::new(a.substitute(subs)), Box::new(b.substitute(subs))),
            Expr::Mul(a, b) => Expr::Mul(Box::new(a.substitute(subs)), Box::new(b.substitute(subs))),
            Expr::Div(a, b) => Expr::Div(Box::new(a.substitute(subs)), Box::new(b.substitute(subs))),
            Expr::Neg(a) => Expr::Neg(Box::new(a.substitute(subs))),
            Expr::Const(_) | Expr::Param(_) | Expr::Field(_) | Expr::Derivative(..) => self.clone(),
        }
    }

    fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Expr::Neg(a) => a.visit(f),
            _ => {}
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Symbol(s) = e {
                out.insert(*s);
            }
        });
        out
    }

    /// Axes along which the expression differentiates.
    pub fn derivative_axes(&self) -> BTreeSet<Axis> {
        let mut out = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Derivative(_, axis) = e {
                out.insert(*axis);
            }
        });
        out
    }

    /// Every field read, plain or differentiated, in traversal order.
    pub fn field_refs(&self) -> Vec<FieldRef> {
        let mut out = Vec::new();
        self.visit(&mut |e| match e {
            Expr::Field(r) | Expr::Derivative(r, _) => out.push(*r),
            _ => {}
        });
        out
    }

    pub fn params(&self) -> BTreeSet<ParamId> {
        let mut out = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Param(p) = e {
                out.insert(*p);
            }
        });
        out
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v)
    }
}

impl From<FieldRef> for Expr {
    fn from(r: FieldRef) -> Self {
        Expr::Field(r)
    }
}

impl From<ParamId> for Expr {
    fn from(p: ParamId) -> Self {
        Expr::Param(p)
    }
}

impl From<Symbol> for Expr {
    fn from(s: Symbol) -> Self {
        Expr::Symbol(s)
    }
}

macro_rules! impl_expr_ops {
    ($($lhs:ty),*) => {$(
        impl<T: Into<Expr>> Add<T> for $lhs {
            type Output = Expr;
            fn add(self, rhs: T) -> Expr {
                Expr::Add(Box::new(self.into()), Box::new(rhs.into()))
            }
        }

        impl<T: Into<Expr>> Sub<T> for $lhs {
            type Output = Expr;
            fn sub(self, rhs: T) -> Expr {
                Expr::Add(Box::new(self.into()), Box::new(Expr::Neg(Box::new(rhs.into()))))
            }
        }

        impl<T: Into<Expr>> Mul<T> for $lhs {
            type Output = Expr;
            fn mul(self, rhs: T) -> Expr {
                Expr::Mul(Box::new(self.into()), Box::new(rhs.into()))
            }
        }

        impl<T: Into<Expr>> Div<T> for $lhs {
            type Output = Expr;
            fn div(self, rhs: T) -> Expr {
                Expr::Div(Box::new(self.into()), Box::new(rhs.into()))
            }
        }

        impl Neg for $lhs {
            type Output = Expr;
            fn neg(self) -> Expr {
                Expr::Neg(Box::new(self.into()))
            }
        }

        impl Add<$lhs> for f64 {
            type Output = Expr;
            fn add(self, rhs: $lhs) -> Expr {
                Expr::Const(self) + rhs
            }
        }

        impl Sub<$lhs> for f64 {
            type Output = Expr;
            fn sub(self, rhs: $lhs) -> Expr {
                Expr::Const(self) - rhs
            }
        }

        impl Mul<$lhs> for f64 {
            type Output = Expr;
            fn mul(self, rhs: $lhs) -> Expr {
                Expr::Const(self) * rhs
            }
        }

        impl Div<$lhs> for f64 {
            type Output = Expr;
            fn div(self, rhs: $lhs) -> Expr {
                Expr::Const(self) / rhs
            }
        }
    )*};
}

impl_expr_ops!(Expr, FieldRef, ParamId, Symbol);
