//! Diesel schema for worker persistence.

diesel::table! {
    /// Registered workers with their latest heartbeat state.
    workers (id) {
        /// Internal worker identifier.
        id -> Uuid,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Availability status.
        #[max_length = 20]
        status -> Varchar,
        /// Task the worker is bound to.
        current_task_id -> Nullable<Uuid>,
        /// Run mode.
        #[max_length = 20]
        mode -> Varchar,
        /// Latest resource telemetry.
        telemetry -> Jsonb,
        /// Capability payload.
        capabilities -> Jsonb,
        /// When the last heartbeat was applied.
        last_heartbeat_at -> Nullable<Timestamptz>,
        /// Registration timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
