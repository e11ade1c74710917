/// Rayon or sequential iteration, chosen by the `parallel` feature.
///
/// With `parallel` this is rayon's prelude. Without it, `into_par_iter()`
/// falls back to `into_iter()`, so chains such as `.filter_map()` and
/// `.collect()` resolve to the standard `Iterator` methods and keep their
/// order.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
