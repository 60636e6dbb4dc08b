pub mod threaded_event_executor;
