mod config;
mod error;
mod gradebook;
mod session;
mod storage;
mod teacher_view;
mod worksheet;

use std::collections::HashMap;
use std::sync::Arc;

use config::{Config, StorageBackend};
use dotenv::dotenv;
use gradebook::{Gradebook, Receipt};
use session::{Classroom, Progress, State, Student};
use storage::{cache::RecentSubmissions, memory::MemoryStore, supabase::SupabaseStore, SubmissionStore};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode},
    utils::{command::BotCommands, html},
};
use worksheet::{builder::WorksheetBuilder, Worksheet};

type WorksheetDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SessionStorage = std::sync::Arc<ErasedStorage<State>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Comandos disponibles:")]
enum Command {
    #[command(description = "empezar de nuevo.")]
    Start,
    #[command(description = "ingresar otra clave.")]
    Clave,
    #[command(description = "ver el registro de notas.")]
    Notas,
    #[command(description = "mostrar esta ayuda.")]
    Ayuda,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting worksheet bot...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn SubmissionStore> = match &config.storage {
        StorageBackend::Supabase {
            url,
            api_key,
            table,
        } => match SupabaseStore::new(url, api_key, table) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                log::error!("Could not create the Supabase client: {}", e);
                std::process::exit(1);
            }
        },
        StorageBackend::Memory => {
            log::warn!("Using the in-memory store: grades are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let classroom = Arc::new(Classroom::new(
        WorksheetBuilder::new(config.templates.clone(), config.questions_per_worksheet),
        config.worksheet_count,
        Gradebook::new(
            store,
            RecentSubmissions::new(config.recent_cache_ttl),
            config.recent_limit,
        ),
    ));

    log::info!("Opening dialogue storage at {}", config.dialogue_db);
    let storage: SessionStorage = match SqliteStorage::open(&config.dialogue_db, Json).await {
        Ok(storage) => storage.erase(),
        Err(e) => {
            log::error!("Could not open {}: {}", config.dialogue_db, e);
            std::process::exit(1);
        }
    };

    let bot = Bot::from_env();

    let handler = Update::filter_message()
        .enter_dialogue::<Message, ErasedStorage<State>, State>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .branch(dptree::case![Command::Start].endpoint(start))
                .branch(dptree::case![Command::Clave].endpoint(ask_for_key))
                .branch(dptree::case![Command::Notas].endpoint(show_grades))
                .branch(dptree::case![Command::Ayuda].endpoint(help)),
        )
        .branch(dptree::case![State::Start].endpoint(start))
        .branch(dptree::case![State::ReceiveKey { previous }].endpoint(receive_key))
        .branch(
            dptree::case![State::ChooseWorksheet {
                student,
                worksheets,
                last_score
            }]
            .endpoint(receive_worksheet_choice),
        )
        .branch(
            dptree::case![State::AnswerWorksheet {
                student,
                worksheets,
                worksheet_index,
                answers,
                question_number
            }]
            .endpoint(receive_answer),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, classroom])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

const GREETING_TEXT: &str = "📝 ¡Hola! Genero hojas de trabajo aritméticas personalizadas y tu nota se guarda automáticamente.\n\nIngresa tu clave (un número entero, ej. 5, 12, 100):";

async fn start(bot: Bot, dialogue: WorksheetDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.update(State::ReceiveKey { previous: None }).await?;
    Ok(())
}

async fn ask_for_key(bot: Bot, dialogue: WorksheetDialogue, msg: Message) -> HandlerResult {
    // Remember the current set so typing the same key again keeps it.
    let previous = match dialogue.get().await? {
        Some(State::ChooseWorksheet {
            student, worksheets, ..
        })
        | Some(State::AnswerWorksheet {
            student, worksheets, ..
        }) => Some((student, worksheets)),
        Some(State::ReceiveKey { previous }) => previous,
        _ => None,
    };
    bot.send_message(msg.chat.id, "Ingresa tu nueva clave:")
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.update(State::ReceiveKey { previous }).await?;
    Ok(())
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn show_grades(bot: Bot, classroom: Arc<Classroom>, msg: Message) -> HandlerResult {
    let listing = classroom.gradebook().recent().await;
    bot.send_message(msg.chat.id, teacher_view::render_listing(listing))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

fn worksheet_keyboard(worksheets: &[Worksheet]) -> KeyboardMarkup {
    let buttons = (0..worksheets.len())
        .map(|i| KeyboardButton::new(session::worksheet_label(i)))
        .collect::<Vec<_>>();
    KeyboardMarkup::new(vec![buttons]).resize_keyboard(true)
}

async fn list_worksheets(
    bot: &Bot,
    msg: &Message,
    worksheets: &[Worksheet],
    last_score: Option<f64>,
) -> HandlerResult {
    let mut text = String::new();
    if let Some(score) = last_score {
        text.push_str(&format!("Tu última nota obtenida fue: <b>{:.2}%</b>\n\n", score));
    }
    text.push_str("Elige una hoja de trabajo:");

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(worksheet_keyboard(worksheets))
        .await?;
    Ok(())
}

async fn receive_key(
    bot: Bot,
    dialogue: WorksheetDialogue,
    classroom: Arc<Classroom>,
    previous: Option<(Student, Vec<Worksheet>)>,
    msg: Message,
) -> HandlerResult {
    let state = match msg.text().map(|text| classroom.enter_key(text, previous)) {
        Some(Ok(state)) => state,
        Some(Err(e)) => {
            bot.send_message(msg.chat.id, e.to_string()).await?;
            return Ok(());
        }
        None => {
            bot.send_message(msg.chat.id, "La clave debe ser un número entero válido.")
                .await?;
            return Ok(());
        }
    };

    if let State::ChooseWorksheet { worksheets, .. } = &state {
        list_worksheets(&bot, &msg, worksheets, None).await?;
    }
    dialogue.update(state).await?;
    Ok(())
}

async fn receive_worksheet_choice(
    bot: Bot,
    dialogue: WorksheetDialogue,
    classroom: Arc<Classroom>,
    (student, worksheets, last_score): (Student, Vec<Worksheet>, Option<f64>),
    msg: Message,
) -> HandlerResult {
    let choice = msg.text().unwrap_or_default();
    let state = match session::choose_worksheet(student, worksheets, choice) {
        Ok(state) => state,
        Err((student, worksheets)) => {
            bot.send_message(msg.chat.id, "Por favor, elige una de las hojas disponibles.")
                .await?;
            dialogue
                .update(State::ChooseWorksheet {
                    student,
                    worksheets,
                    last_score,
                })
                .await?;
            return Ok(());
        }
    };

    if let State::AnswerWorksheet {
        student,
        worksheets,
        worksheet_index,
        ..
    } = &state
    {
        let mut text = String::new();
        if let Some(worksheet) = worksheets.get(*worksheet_index) {
            text.push_str(&format!(
                "<b>Hoja de Trabajo: {}</b>\n",
                html::escape(&worksheet.id)
            ));
            if worksheet.is_truncated() {
                text.push_str(&format!(
                    "<i>Esta hoja tiene {} de {} preguntas.</i>\n",
                    worksheet.questions.len(),
                    worksheet.requested_questions
                ));
            }
        }
        text.push_str(&format!(
            "¡Hola, {}! Resuelve las siguientes preguntas:",
            html::escape(student.raw_key.trim())
        ));
        bot.send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(KeyboardRemove::new())
            .await?;
    }

    // No reply yet: this asks the first question.
    proceed(bot, dialogue, classroom, state, None, msg).await
}

async fn receive_answer(
    bot: Bot,
    dialogue: WorksheetDialogue,
    classroom: Arc<Classroom>,
    (student, worksheets, worksheet_index, answers, question_number): (
        Student,
        Vec<Worksheet>,
        usize,
        HashMap<String, String>,
        usize,
    ),
    msg: Message,
) -> HandlerResult {
    let Some(text) = msg.text().map(str::to_string) else {
        bot.send_message(msg.chat.id, "Por favor, responde con texto.")
            .await?;
        return Ok(());
    };

    let state = State::AnswerWorksheet {
        student,
        worksheets,
        worksheet_index,
        answers,
        question_number,
    };
    proceed(bot, dialogue, classroom, state, Some(text.as_str()), msg).await
}

/// Moves an answering chat forward and hands the worksheet in once every
/// question has an answer.
async fn proceed(
    bot: Bot,
    dialogue: WorksheetDialogue,
    classroom: Arc<Classroom>,
    state: State,
    reply: Option<&str>,
    msg: Message,
) -> HandlerResult {
    let Some(State::AnswerWorksheet {
        student,
        worksheets,
        worksheet_index,
        answers,
        ..
    }) = advance(&bot, &dialogue, state, reply, &msg).await?
    else {
        return Ok(());
    };

    let (receipt, next) = match classroom
        .hand_in(student.clone(), worksheets, worksheet_index, &answers)
        .await
    {
        Ok(handed_in) => handed_in,
        Err((e, next)) => {
            log::warn!("Chat {} handed in a missing worksheet: {}", msg.chat.id, e);
            bot.send_message(msg.chat.id, e.to_string()).await?;
            if let State::ChooseWorksheet { worksheets, .. } = &next {
                list_worksheets(&bot, &msg, worksheets, None).await?;
            }
            dialogue.update(next).await?;
            return Ok(());
        }
    };
    bot.send_message(msg.chat.id, grading_report(&receipt, &student))
        .parse_mode(ParseMode::Html)
        .await?;
    if let State::ChooseWorksheet {
        worksheets,
        last_score,
        ..
    } = &next
    {
        list_worksheets(&bot, &msg, worksheets, *last_score).await?;
    }
    dialogue.update(next).await?;
    Ok(())
}

/// Stores the reply to the previous question and asks the next one.
///
/// Returns the state back once every question has an answer.
async fn advance(
    bot: &Bot,
    dialogue: &WorksheetDialogue,
    state: State,
    reply: Option<&str>,
    msg: &Message,
) -> Result<Option<State>, Box<dyn std::error::Error + Send + Sync>> {
    let State::AnswerWorksheet {
        student,
        worksheets,
        worksheet_index,
        mut answers,
        question_number,
    } = state
    else {
        return Ok(None);
    };

    let progress = match worksheets.get(worksheet_index) {
        Some(worksheet) => session::record_answer(worksheet, &mut answers, question_number, reply),
        None => Progress::Complete,
    };

    match progress {
        Progress::Next { number, question } => {
            bot.send_message(
                msg.chat.id,
                format!("Pregunta {}:\n<b>{}</b>", number, html::escape(&question.text)),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            dialogue
                .update(State::AnswerWorksheet {
                    student,
                    worksheets,
                    worksheet_index,
                    answers,
                    question_number: number,
                })
                .await?;
            Ok(None)
        }
        Progress::Complete => Ok(Some(State::AnswerWorksheet {
            student,
            worksheets,
            worksheet_index,
            answers,
            question_number,
        })),
    }
}

fn grading_report(receipt: &Receipt, student: &Student) -> String {
    let result = &receipt.result;
    let mut lines = result
        .details
        .iter()
        .enumerate()
        .map(|(i, (_, detail))| {
            format!(
                "{} Pregunta {}: {} Tu respuesta: {} Correcta: {}",
                if detail.is_correct { "✅" } else { "❌" },
                i + 1,
                html::escape(&detail.question_text),
                html::escape(detail.submitted.as_deref().unwrap_or("")),
                html::escape(&detail.correct),
            )
        })
        .collect::<Vec<_>>();
    lines.push(format!(
        "\nCorrectas: {} de {}",
        result.correct_count, result.total_questions
    ));

    match &receipt.stored {
        Ok(()) => lines.push(format!(
            "🎉 ¡Nota <b>{:.2}%</b> guardada automáticamente para {}!",
            result.rounded_score(),
            html::escape(student.raw_key.trim())
        )),
        Err(e) => lines.push(format!(
            "Tu nota es <b>{:.2}%</b>, pero hubo un error al guardarla: {}",
            result.rounded_score(),
            html::escape(&e.to_string())
        )),
    }
    lines.join("\n")
}
