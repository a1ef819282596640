// 服务模块
// 提供核心业务逻辑服务

pub mod assistant;
pub mod database;
pub mod llm;
pub mod parser;
pub mod scoring;
pub mod session;

pub use assistant::{
    ask_tutor,
    describe_course,
    generate_code_solution,
    generate_exam_strategy,
    generate_study_plan,
    AssistantPrompt,
    ChatModel,
    CodeSolution,
    DailyPlan,
    ExamStrategy,
    TutorRequest,
    TutorRole,
    TutorTurn,
};

pub use llm::{
    build_chat_prompt,
    ChatMessage,
    InferenceRequest,
    InferenceResponse,
    LlmClient,
    LlmConfig,
    QuizPrompt,
    Role,
};

pub use parser::{
    QuizTextParser,
    extract_question_number,
    parse_answer_key_line,
    parse_quiz_text,
};

pub use scoring::{history_stats, score, DEFAULT_PASS_MARK};

pub use session::{
    QuizPhase,
    QuizSession,
    QuizTextGenerator,
    ResultStore,
    SubjectCatalog,
    Submission,
};

pub use database::DatabaseService;
