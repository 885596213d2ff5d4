// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod action;
pub mod forms;
pub mod ids;
pub mod model;
pub mod request;
pub mod session;
pub mod table;

pub use action::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use request::*;
pub use session::*;
pub use table::*;
