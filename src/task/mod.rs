// Declare submodules
pub mod task_dto;
pub mod task_handlers;
pub mod task_models;
pub mod task_repository;

// Re-export public items
pub use task_dto::{
    CreateTaskRequest, OkResponse, TaskChanges, TaskResponse, TasksResponse, UpdateTaskRequest,
};
pub use task_handlers::{create_task, delete_task, get_tasks, update_task};
pub use task_models::{DueReminder, Task, MAX_TASK_LENGTH};
pub use task_repository::{TaskRepository, REMINDER_BATCH_LIMIT};
