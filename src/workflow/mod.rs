//! The declarative browser-automation workflow interpreter:
//! selector builder (`crate::selector`), locator resolver (`locator`),
//! scope tracking (`scope`), step representation (`step`), step executors
//! and dispatcher (`executors`, `dispatcher`), spreadsheet row loading
//! (`excel`), the download sub-protocol (`download`), the fragment
//! assembler (`assembler`), and the runner (`runner`).

pub mod assembler;
pub mod dispatcher;
pub mod download;
pub mod excel;
pub mod executors;
pub mod locator;
pub mod runner;
pub mod scope;
pub mod step;
