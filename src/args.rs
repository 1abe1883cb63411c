/// Positional access to one argument of a mock call's inputs tuple.
///
/// Implemented for tuples of up to six elements.
pub trait ArgAt<const I: usize> {
    /// The type of argument `I`.
    type Arg;

    /// Borrow argument `I`.
    fn arg_at(&self) -> &Self::Arg;
}

macro_rules! arg_at {
    ($idx:tt => $arg:ident; $($t:ident),+) => {
        impl<$($t),+> ArgAt<$idx> for ($($t,)+) {
            type Arg = $arg;

            fn arg_at(&self) -> &$arg {
                &self.$idx
            }
        }
    };
}

arg_at!(0 => A; A);

arg_at!(0 => A; A, B);
arg_at!(1 => B; A, B);

arg_at!(0 => A; A, B, C);
arg_at!(1 => B; A, B, C);
arg_at!(2 => C; A, B, C);

arg_at!(0 => A; A, B, C, D);
arg_at!(1 => B; A, B, C, D);
arg_at!(2 => C; A, B, C, D);
arg_at!(3 => D; A, B, C, D);

arg_at!(0 => A; A, B, C, D, E);
arg_at!(1 => B; A, B, C, D, E);
arg_at!(2 => C; A, B, C, D, E);
arg_at!(3 => D; A, B, C, D, E);
arg_at!(4 => E; A, B, C, D, E);

arg_at!(0 => A; A, B, C, D, E, G);
arg_at!(1 => B; A, B, C, D, E, G);
arg_at!(2 => C; A, B, C, D, E, G);
arg_at!(3 => D; A, B, C, D, E, G);
arg_at!(4 => E; A, B, C, D, E, G);
arg_at!(5 => G; A, B, C, D, E, G);
