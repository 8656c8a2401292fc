pub mod analysis_bindings;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use pyo3::prelude::*;


#[pymodule]
#[pyo3(name = "_cratercluster")]
mod cratercluster {
    use super::*;

    #[pymodule]
    mod analysis_bindings {
        #[pymodule_export]
        use crate::analysis_bindings::{
            analyze_cluster,
            best_fit_ellipse,
            project_coordinates,
        };
    }
}
