/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod datetime;
pub use datetime::LtDateTime;

mod duration;
pub use duration::LtDuration;

mod http;
pub use self::http::{LtHttpMethod, LtHttpUri, LtHttpVersion};

mod uuid;
pub use self::uuid::LtUuid;
