use crate::tree::Tree;

/// A residual function `r(y, args) -> (residual, aux)` together with its
/// Jacobian-vector product.
///
/// The least-squares objective is `sum_squares(r(y, args))`. `aux` is any extra
/// output the caller wants carried through the solve; it is not optimised.
pub trait ResidualFn<Y: Tree, Args> {
    /// The residual.
    type Out: Tree;
    /// Auxiliary output.
    type Aux: Clone;

    /// Evaluate the residual and auxiliary output at `y`.
    fn call(&self, y: &Y, args: &Args) -> (Self::Out, Self::Aux);

    /// Directional derivative of the residual at `y` along `tangent`, i.e. `J(y) tangent`.
    fn jvp(&self, y: &Y, args: &Args, tangent: &Y) -> Self::Out;
}

/// A [`ResidualFn`] built from two closures: one evaluating the residual, one its
/// Jacobian-vector product.
#[derive(Debug, Clone, Copy)]
pub struct FnResidual<F, J> {
    residual: F,
    jvp: J,
}

impl<F, J> FnResidual<F, J> {
    /// Pair a residual function with its Jacobian-vector product.
    pub fn new(residual: F, jvp: J) -> Self {
        Self { residual, jvp }
    }
}

impl<Y, Args, Out, Aux, F, J> ResidualFn<Y, Args> for FnResidual<F, J>
where
    Y: Tree,
    Out: Tree,
    Aux: Clone,
    F: Fn(&Y, &Args) -> (Out, Aux),
    J: Fn(&Y, &Args, &Y) -> Out,
{
    type Out = Out;
    type Aux = Aux;

    fn call(&self, y: &Y, args: &Args) -> (Out, Aux) {
        (self.residual)(y, args)
    }

    fn jvp(&self, y: &Y, args: &Args, tangent: &Y) -> Out {
        (self.jvp)(y, args, tangent)
    }
}

/// Evaluate `f` at `y` and return its value, its linearization at `y`, and its aux.
///
/// The linearization is the map `t -> J(y) t`.
pub fn linearize<'a, F, Y, Args>(
    f: &'a F,
    y: &'a Y,
    args: &'a Args,
) -> (F::Out, impl Fn(&Y) -> F::Out + 'a, F::Aux)
where
    F: ResidualFn<Y, Args>,
    Y: Tree,
{
    let (value, aux) = f.call(y, args);
    let linear = move |tangent: &Y| f.jvp(y, args, tangent);
    (value, linear, aux)
}
