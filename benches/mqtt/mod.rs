pub mod process_loop;
