use crate::api::validate_note_fields;
use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Card, CardContent, CardDescription,
    CardHeader, CardItem, CardList, CardTitle, Input, Label, Separator, Spinner, Textarea,
};
use crate::editor::{confirm_saved, AutosaveController, EditBuffer};
use crate::models::{BroadcastMessage, Note};
use crate::state::{AppContext, CollectionAction, NoticeKind};
use crate::util::{avatar_color, avatar_initial, content_preview};
use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsCast;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Processing {
    Create,
    Update,
    Delete,
}

#[component]
pub fn Navigation(#[prop(into)] title: String) -> impl IntoView {
    view! {
        <header class="w-full border-b bg-background px-6 py-4">
            <h1 class="text-xl font-semibold text-center">{title}</h1>
        </header>
    }
}

#[component]
fn StatusBar() -> impl IntoView {
    let status = expect_context::<AppContext>().0.status;

    view! {
        <Show when=move || status.get().is_some() fallback=|| ().into_view()>
            {move || {
                status.get().map(|notice| {
                    let border = match notice.kind {
                        NoticeKind::Error => "border-destructive/30",
                        NoticeKind::Success => "border-success/30",
                    };
                    let text = match notice.kind {
                        NoticeKind::Error => "text-destructive text-xs",
                        NoticeKind::Success => "text-muted-foreground text-xs",
                    };
                    view! {
                        <Alert class=border>
                            <AlertDescription class=text>{notice.message}</AlertDescription>
                        </Alert>
                    }
                })
            }}
        </Show>
    }
}

/// Stacked colored initial-avatars for everyone currently connected.
#[component]
fn PresenceRow() -> impl IntoView {
    let online_users = expect_context::<AppContext>().0.online_users;

    view! {
        <div class="flex space-x-[-8px]">
            <Show
                when=move || !online_users.get().is_empty()
                fallback=|| view! { <p class="text-muted-foreground text-sm">"No users online"</p> }
            >
                {move || {
                    online_users
                        .get()
                        .into_iter()
                        .map(|user| {
                            let color = avatar_color(&user);
                            let initial = avatar_initial(&user);
                            view! {
                                <div
                                    class="relative flex justify-center items-center text-white font-bold rounded-full w-10 h-10 border-2 border-background"
                                    style=format!("background-color: {color}")
                                    title=user
                                >
                                    {initial}
                                </div>
                            }
                        })
                        .collect_view()
                }}
            </Show>
        </div>
    }
}

/// Editing pane for the open note: title + content write to the shared
/// edit buffer, every keystroke re-arms the autosave window, and the
/// explicit actions bypass the debounce.
#[component]
fn NoteEditor() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let autosave = expect_context::<AutosaveController>();
    let buffer = app.buffer;
    let processing: RwSignal<Option<Processing>> = RwSignal::new(None);

    let title_value = move || buffer.get().map(|b| b.title).unwrap_or_default();
    let content_value = move || buffer.get().map(|b| b.content).unwrap_or_default();

    let app_t = app.clone();
    let autosave_t = autosave.clone();
    let on_title_input = move |ev: web_sys::Event| {
        let Some(value) = ev
            .target()
            .and_then(|t| t.dyn_ref::<web_sys::HtmlInputElement>().map(|i| i.value()))
        else {
            return;
        };
        let mut edited_id = None;
        app_t.buffer.update(|b| {
            if let Some(buf) = b {
                buf.edit_title(&value);
                edited_id = Some(buf.note_id.clone());
            }
        });
        if let Some(id) = edited_id {
            autosave_t.note_edited(&id);
        }
    };

    let app_c = app.clone();
    let autosave_c = autosave.clone();
    let on_content_input = move |ev: web_sys::Event| {
        let Some(value) = ev.target().and_then(|t| {
            t.dyn_ref::<web_sys::HtmlTextAreaElement>()
                .map(|a| a.value())
        }) else {
            return;
        };
        let mut edited_id = None;
        app_c.buffer.update(|b| {
            if let Some(buf) = b {
                buf.edit_content(&value);
                edited_id = Some(buf.note_id.clone());
            }
        });
        if let Some(id) = edited_id {
            autosave_c.note_edited(&id);
        }
    };

    let app_u = app.clone();
    let autosave_u = autosave.clone();
    let on_update = move |_| {
        let Some(buf) = app_u.buffer.get_untracked() else {
            return;
        };
        // The explicit write must not race a stale debounce timer.
        autosave_u.cancel(&buf.note_id);
        processing.set(Some(Processing::Update));

        let app = app_u.clone();
        spawn_local(async move {
            match app
                .api_client
                .update_note(&buf.note_id, &buf.title, &buf.content)
                .await
            {
                Ok(()) => {
                    let note = Note::new(buf.note_id.clone(), buf.title.clone(), buf.content.clone());
                    app.apply(CollectionAction::Updated(note.clone()));
                    app.buffer
                        .update(|b| confirm_saved(b, &buf.note_id, &buf.title, &buf.content));
                    app.channel.send(&BroadcastMessage::NoteUpdate { note });
                    app.notify_success("Note updated");
                }
                Err(e) => app.notify_error(format!("Failed to update note: {e}")),
            }
            processing.set(None);
        });
    };

    let app_d = app.clone();
    let autosave_d = autosave.clone();
    let on_delete = move |_| {
        let Some(buf) = app_d.buffer.get_untracked() else {
            return;
        };
        autosave_d.cancel(&buf.note_id);
        processing.set(Some(Processing::Delete));

        let app = app_d.clone();
        spawn_local(async move {
            match app.api_client.delete_note(&buf.note_id).await {
                Ok(()) => {
                    app.apply(CollectionAction::Removed(buf.note_id.clone()));
                    app.buffer.set(None);
                    app.channel.send(&BroadcastMessage::NoteDelete {
                        note_id: buf.note_id.clone(),
                    });
                    app.notify_success("Note deleted");
                }
                Err(e) => app.notify_error(format!("Failed to delete note: {e}")),
            }
            processing.set(None);
        });
    };

    let app_x = app.clone();
    let autosave_x = autosave.clone();
    let on_close = move |_| {
        // Pending debounce is discarded, not flushed.
        if let Some(buf) = app_x.buffer.get_untracked() {
            autosave_x.cancel(&buf.note_id);
        }
        app_x.buffer.set(None);
        app_x.apply(CollectionAction::Activated(None));
    };

    view! {
        <div class="flex flex-col gap-4 h-full">
            <div class="flex flex-col gap-1.5">
                <Label html_for="note-title" class="text-xs">"Title"</Label>
                <input
                    id="note-title"
                    type="text"
                    class="border-input flex h-9 w-full rounded-md border bg-transparent px-3 py-1 text-sm shadow-xs outline-none focus-visible:ring-2 focus-visible:ring-ring/50"
                    placeholder="Enter note title"
                    prop:value=title_value
                    on:input=on_title_input
                />
            </div>

            <div class="flex flex-col gap-1.5 grow">
                <Label html_for="note-content" class="text-xs">"Content"</Label>
                <textarea
                    id="note-content"
                    class="border-input flex w-full grow rounded-md border bg-transparent px-3 py-2 text-sm shadow-xs outline-none focus-visible:ring-2 focus-visible:ring-ring/50 resize-y"
                    rows=10
                    placeholder="Enter note content"
                    prop:value=content_value
                    on:input=on_content_input
                />
            </div>

            <Separator />

            <div class="flex gap-2">
                <Button
                    class="flex-1"
                    variant=ButtonVariant::Warning
                    size=ButtonSize::Sm
                    attr:disabled=move || processing.get().is_some()
                    on:click=on_update
                >
                    <span class="inline-flex items-center gap-2">
                        <Show
                            when=move || processing.get() == Some(Processing::Update)
                            fallback=|| ().into_view()
                        >
                            <Spinner />
                        </Show>
                        {move || if processing.get() == Some(Processing::Update) {
                            "Updating..."
                        } else {
                            "Update Note"
                        }}
                    </span>
                </Button>

                <Button
                    class="flex-1"
                    variant=ButtonVariant::Destructive
                    size=ButtonSize::Sm
                    attr:disabled=move || processing.get().is_some()
                    on:click=on_delete
                >
                    {move || if processing.get() == Some(Processing::Delete) {
                        "Deleting..."
                    } else {
                        "Delete Note"
                    }}
                </Button>

                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::Sm
                    attr:disabled=move || processing.get().is_some()
                    on:click=on_close
                >
                    "Close"
                </Button>
            </div>
        </div>
    }
}

/// Create form, shown while no note is open. Validation happens here,
/// before any round trip; the gateway never rejects payloads.
#[component]
fn CreateNoteForm() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let title: RwSignal<String> = RwSignal::new(String::new());
    let content: RwSignal<String> = RwSignal::new(String::new());
    let processing: RwSignal<Option<Processing>> = RwSignal::new(None);

    let app_s = app.clone();
    let on_save = move |_| {
        let title_val = title.get_untracked();
        let content_val = content.get_untracked();

        if let Err(e) = validate_note_fields(&title_val, &content_val) {
            app_s.notify_error(e.to_string());
            return;
        }

        processing.set(Some(Processing::Create));
        let app = app_s.clone();
        spawn_local(async move {
            match app.api_client.create_note(&title_val, &content_val).await {
                Ok(note) => {
                    app.apply(CollectionAction::Created(note.clone()));
                    app.channel.send(&BroadcastMessage::NoteCreate { note });
                    app.notify_success("Note created");
                    title.set(String::new());
                    content.set(String::new());
                }
                Err(e) => app.notify_error(format!("Failed to create note: {e}")),
            }
            processing.set(None);
        });
    };

    let on_clear = move |_| {
        title.set(String::new());
        content.set(String::new());
    };

    view! {
        <div class="flex flex-col gap-4 h-full">
            <div class="flex flex-col gap-1.5">
                <Label html_for="new-title" class="text-xs">"Title"</Label>
                <Input id="new-title" placeholder="Enter note title" bind_value=title />
            </div>

            <div class="flex flex-col gap-1.5 grow">
                <Label html_for="new-content" class="text-xs">"Content"</Label>
                <Textarea
                    id="new-content"
                    placeholder="Enter note content"
                    rows=10
                    bind_value=content
                />
            </div>

            <Separator />

            <div class="flex gap-2">
                <Button
                    class="flex-1"
                    size=ButtonSize::Sm
                    attr:disabled=move || processing.get().is_some()
                    on:click=on_save
                >
                    <span class="inline-flex items-center gap-2">
                        <Show
                            when=move || processing.get() == Some(Processing::Create)
                            fallback=|| ().into_view()
                        >
                            <Spinner />
                        </Show>
                        {move || if processing.get() == Some(Processing::Create) {
                            "Saving..."
                        } else {
                            "Save Note"
                        }}
                    </span>
                </Button>

                <Button
                    class="flex-1"
                    variant=ButtonVariant::Secondary
                    size=ButtonSize::Sm
                    attr:disabled=move || processing.get().is_some()
                    on:click=on_clear
                >
                    "Clear"
                </Button>
            </div>
        </div>
    }
}

/// Note list with per-note Load. Loading fetches a fresh copy (no
/// cache inside the gateway), activates the note, and opens a clean
/// buffer for it.
#[component]
fn NoteSidebar() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let autosave = expect_context::<AutosaveController>();
    let collection = app.collection;
    let notes_loading = app.notes_loading;
    let loading_note: RwSignal<Option<String>> = RwSignal::new(None);

    // List items re-render reactively; the row closures can only
    // capture Copy handles, so the session pair goes in a slot.
    let session = StoredValue::new((app, autosave));

    view! {
        <Card class="w-80 shrink-0 overflow-y-auto">
            <CardHeader>
                <CardTitle class="text-base">"Notes"</CardTitle>
                <CardDescription class="text-xs">
                    {move || format!("{} total", collection.get().notes.len())}
                </CardDescription>
            </CardHeader>

            <CardContent>
                <Show
                    when=move || !collection.get().notes.is_empty()
                    fallback=move || view! {
                        <div class="text-xs text-muted-foreground text-center">
                            {move || if notes_loading.get() {
                                "Loading notes..."
                            } else {
                                "No notes to display"
                            }}
                        </div>
                    }
                >
                    <CardList>
                        {move || {
                            let col = collection.get();
                            let active_id = col.active_note_id.clone();
                            col.notes
                                .into_iter()
                                .map(|note| {
                                    let is_active = active_id.as_deref() == Some(note.id.as_str());
                                    let item_class = if is_active {
                                        "flex flex-col items-start gap-2 rounded-md border border-primary px-4 py-3"
                                    } else {
                                        "flex flex-col items-start gap-2 rounded-md border px-4 py-3"
                                    };

                                    let note_id = note.id.clone();
                                    let on_load = move |_| {
                                        let (app, autosave) = session.get_value();
                                        if loading_note.get_untracked().is_some() {
                                            return;
                                        }
                                        // Switching discards the previous
                                        // buffer and its pending autosave.
                                        if let Some(buf) = app.buffer.get_untracked() {
                                            autosave.cancel(&buf.note_id);
                                        }
                                        loading_note.set(Some(note_id.clone()));

                                        let note_id = note_id.clone();
                                        spawn_local(async move {
                                            match app.api_client.get_note(&note_id).await {
                                                Ok(note) => {
                                                    app.apply(CollectionAction::Updated(note.clone()));
                                                    app.apply(CollectionAction::Activated(Some(note.id.clone())));
                                                    app.buffer.set(Some(EditBuffer::open(&note)));
                                                }
                                                Err(e) => {
                                                    app.notify_error(format!("Failed to load note: {e}"))
                                                }
                                            }
                                            loading_note.set(None);
                                        });
                                    };

                                    let loading_this = {
                                        let id = note.id.clone();
                                        move || loading_note.get().as_deref() == Some(id.as_str())
                                    };

                                    view! {
                                        <CardItem class=item_class>
                                            <div class="w-full">
                                                <h4 class="font-medium truncate w-full text-sm" title=note.title.clone()>
                                                    {note.title.clone()}
                                                </h4>
                                                <p class="text-muted-foreground text-xs break-words">
                                                    {content_preview(&note.content, 70)}
                                                </p>
                                            </div>
                                            <Button
                                                class="w-full"
                                                variant=ButtonVariant::Outline
                                                size=ButtonSize::Sm
                                                attr:disabled=move || loading_note.get().is_some()
                                                on:click=on_load
                                            >
                                                {move || if loading_this() { "Loading..." } else { "Load" }}
                                            </Button>
                                        </CardItem>
                                    }
                                })
                                .collect_view()
                        }}
                    </CardList>
                </Show>
            </CardContent>
        </Card>
    }
}

#[component]
pub fn NotesPage() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let autosave = expect_context::<AutosaveController>();
    let buffer = app.buffer;

    // Initial load: one fetch-all round trip into CollectionState.
    let app_load = app.clone();
    let load_notes = move || {
        let app = app_load.clone();
        app.notes_loading.set(true);
        spawn_local(async move {
            match app.api_client.list_notes().await {
                Ok(notes) => app.apply(CollectionAction::Loaded(notes)),
                Err(e) => app.notify_error(format!("Failed to load notes: {e}")),
            }
            app.notes_loading.set(false);
        });
    };

    Effect::new(move |_| {
        load_notes();
    });

    let app_n = app.clone();
    let autosave_n = autosave.clone();
    let on_new_note = move |_| {
        if let Some(buf) = app_n.buffer.get_untracked() {
            autosave_n.cancel(&buf.note_id);
        }
        app_n.buffer.set(None);
        app_n.apply(CollectionAction::Activated(None));
    };

    view! {
        <div class="min-h-screen bg-background">
            <Navigation title="Collaborative Notes" />

            <div class="mx-auto w-full max-w-[1080px] px-4 py-6 flex flex-col gap-4">
                <StatusBar />

                <div class="flex gap-4">
                    <Card class="flex-1">
                        <CardHeader class="w-full">
                            <div class="flex w-full items-center justify-between">
                                <Button size=ButtonSize::Sm on:click=on_new_note>
                                    "New Note"
                                </Button>
                                <PresenceRow />
                            </div>
                        </CardHeader>

                        <CardContent class="grow">
                            <Show
                                when=move || buffer.get().is_some()
                                fallback=|| view! { <CreateNoteForm /> }
                            >
                                <NoteEditor />
                            </Show>
                        </CardContent>
                    </Card>

                    <NoteSidebar />
                </div>
            </div>
        </div>
    }
}
