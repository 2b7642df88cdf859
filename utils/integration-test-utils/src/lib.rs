/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod integration_test_utils;
pub use integration_test_utils::{init_logging, wait_until};

mod integration_test_events;
pub use integration_test_events::{capture_events, CapturedEvent};

mod scripted_registry_spi;
pub use scripted_registry_spi::{ScriptedRegistrySpi, SpiCall};

mod integration_test_topologies;
pub use integration_test_topologies::{
    application_instance, fitable_info, legacy_application_instance, single_worker_instance,
    worker,
};
